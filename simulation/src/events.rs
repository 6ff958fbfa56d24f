//! Per-tick event log entries
//!
//! Every state change in a tick is recorded as a [`MeshEvent`]. The log is
//! cleared at the start of each tick, and whether it is empty decides if the
//! tick counter advances.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::types::{NodeId, Packet};

/// Destination for events raised by a node
pub trait EventSink {
    fn record(&mut self, node: &NodeId, kind: EventKind);
}

/// Where an event happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EventScope {
    Mesh,
    Node(NodeId),
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EventKind {
    TopologyGenerated,
    Restored,
    LinkDown { a: NodeId, b: NodeId },
    LinkUp { a: NodeId, b: NodeId },
    NodeDown(NodeId),
    NodeUp(NodeId),
    PacketCreated(Packet),
    SendAttempt { to: NodeId },
    SendFailed { to: NodeId },
    Transmitted(Packet),
    Received(Packet),
    ReceiveRejected(Packet),
    RoundTrip { source: NodeId },
    Unreachable(Packet),
    RoutingInvariant { next_hop: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshEvent {
    pub tick: u64,
    pub scope: EventScope,
    pub kind: EventKind,
}

impl MeshEvent {
    pub fn mesh(tick: u64, kind: EventKind) -> Self {
        Self {
            tick,
            scope: EventScope::Mesh,
            kind,
        }
    }

    pub fn node(tick: u64, node: &NodeId, kind: EventKind) -> Self {
        Self {
            tick,
            scope: EventScope::Node(node.clone()),
            kind,
        }
    }

    /// Whether the event reports a failure of some kind
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::LinkDown { .. }
                | EventKind::NodeDown(_)
                | EventKind::SendFailed { .. }
                | EventKind::ReceiveRejected(_)
                | EventKind::Unreachable(_)
                | EventKind::RoutingInvariant { .. }
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::TopologyGenerated => write!(f, "Generating mesh topology..."),
            EventKind::Restored => write!(f, "Restored all links and nodes"),
            EventKind::LinkDown { a, b } => write!(f, "FAIL: Link ('{a}', '{b}') failed"),
            EventKind::LinkUp { a, b } => write!(f, "Link ('{a}', '{b}') is now working"),
            EventKind::NodeDown(id) => write!(f, "FAIL: Node {id} has failed."),
            EventKind::NodeUp(id) => write!(f, "Node {id} has been restored."),
            EventKind::PacketCreated(p) => write!(f, "Created new packet '{p}'"),
            EventKind::SendAttempt { to } => write!(f, "Attempting to send packet to node {to}"),
            EventKind::SendFailed { to } => write!(f, "FAIL: node {to} could not be reached"),
            EventKind::Transmitted(p) => write!(f, "Successfully transmitted packet '{p}'"),
            EventKind::Received(p) => write!(f, "Successfully received packet '{p}'"),
            EventKind::ReceiveRejected(p) => {
                write!(f, "Failed to receive packet '{p}', node down")
            }
            EventKind::RoundTrip { source } => {
                write!(f, "Acknowledgement packet has returned to {source}")
            }
            EventKind::Unreachable(p) => {
                write!(f, "FAIL: Cannot find valid route for packet '{p}'")
            }
            EventKind::RoutingInvariant { next_hop } => write!(
                f,
                "FATAL ERROR: routing link does not exist from self to {next_hop}!"
            ),
        }
    }
}

impl fmt::Display for MeshEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            EventScope::Mesh => write!(f, "{}-Mesh: {}", self.tick, self.kind),
            EventScope::Node(id) => write!(f, "{}-Node {}: {}", self.tick, id, self.kind),
        }
    }
}

/// The mesh's tick clock together with the events of the current tick
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    tick: u64,
    entries: Vec<MeshEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn entries(&self) -> &[MeshEvent] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn advance(&mut self) {
        self.tick += 1;
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn record_mesh(&mut self, kind: EventKind) {
        let event = MeshEvent::mesh(self.tick, kind);
        trace!(%event);
        self.entries.push(event);
    }
}

impl EventSink for EventLog {
    fn record(&mut self, node: &NodeId, kind: EventKind) {
        let event = MeshEvent::node(self.tick, node, kind);
        trace!(%event);
        self.entries.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_scope_display() {
        let event = MeshEvent::mesh(3, EventKind::Restored);
        assert_eq!(event.to_string(), "3-Mesh: Restored all links and nodes");
        assert!(!event.is_failure());
    }

    #[test]
    fn test_node_scope_display() {
        let event = MeshEvent::node(0, &NodeId::from("4"), EventKind::SendFailed { to: "5".into() });
        assert_eq!(event.to_string(), "0-Node 4: FAIL: node 5 could not be reached");
        assert!(event.is_failure());
    }

    #[test]
    fn test_link_display_keeps_orientation() {
        let kind = EventKind::LinkDown {
            a: "2".into(),
            b: "0".into(),
        };
        assert_eq!(kind.to_string(), "FAIL: Link ('2', '0') failed");
    }

    #[test]
    fn test_event_log_stamps_current_tick() {
        let mut log = EventLog::new();
        log.record_mesh(EventKind::TopologyGenerated);
        log.advance();
        log.record(&NodeId::from("1"), EventKind::NodeUp("1".into()));

        let ticks: Vec<u64> = log.entries().iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, 1]);
        assert_eq!(log.tick(), 1);

        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.tick(), 1);
    }
}
