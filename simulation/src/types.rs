//! Core types for the mesh routing simulator
//!
//! Node identifiers, packets and the unordered link key shared by the
//! routing engine and the scheduler.

use std::borrow::Borrow;
use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the mesh
///
/// Ids are opaque strings taken verbatim from the topology description.
/// Ordering is plain string ordering, which fixes the mesh iteration order.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// An ordered sequence of node ids (a route or a traveled path)
pub type Path = Vec<NodeId>;

/// Kind of packet moving through the mesh
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    /// Outbound payload from source to destination
    #[display("data")]
    Data,
    /// Acknowledgement travelling back to the data packet's source
    #[display("ACK")]
    Ack,
}

/// A message in flight
///
/// `path` starts with the source id and grows by exactly one id per
/// successful hop. `route` is the plan last computed for the packet and may
/// be empty or stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub kind: PacketKind,
    pub source: NodeId,
    pub destination: NodeId,
    pub payload: Option<String>,
    pub route: Path,
    path: Path,
}

impl Packet {
    /// Create a packet that has not yet entered any buffer
    pub fn new(
        kind: PacketKind,
        source: NodeId,
        destination: NodeId,
        payload: Option<String>,
    ) -> Self {
        Self {
            kind,
            source,
            destination,
            payload,
            route: Vec::new(),
            path: Vec::new(),
        }
    }

    /// Nodes this packet has been accepted by, in order
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    /// Hops taken so far (one less than the nodes visited)
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Whether some node appears more than once in the traveled path,
    /// meaning the packet has already been bounced around a cycle
    pub fn has_revisited(&self) -> bool {
        self.path
            .iter()
            .enumerate()
            .any(|(i, id)| self.path[i + 1..].contains(id))
    }

    /// Record acceptance by `node`; the only way `path` changes
    pub(crate) fn visit(&mut self, node: &NodeId) {
        self.path.push(node.clone());
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Data: {}, Type: {}, Source: {}, Destination: {}, Routing: [{}], Path: [{}]",
            self.payload.as_deref().unwrap_or("None"),
            self.kind,
            self.source,
            self.destination,
            join_ids(&self.route),
            join_ids(&self.path),
        )
    }
}

/// An unordered pair of node ids
///
/// The pair is normalized on construction so `(a, b)` and `(b, a)` compare
/// equal and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    low: NodeId,
    high: NodeId,
}

impl LinkKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn ends(&self) -> (&NodeId, &NodeId) {
        (&self.low, &self.high)
    }

    pub fn touches(&self, node: &NodeId) -> bool {
        &self.low == node || &self.high == node
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "('{}', '{}')", self.low, self.high)
    }
}

/// Render ids as `'a', 'b', 'c'`
pub fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(|id| format!("'{}'", id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn test_node_id_string_ordering() {
        // Ids sort as strings, not numbers
        let mut ids = vec![id("2"), id("10"), id("1")];
        ids.sort();
        assert_eq!(ids, vec![id("1"), id("10"), id("2")]);
    }

    #[test]
    fn test_node_id_serde_transparent() {
        let parsed: NodeId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(parsed, id("7"));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"7\"");
    }

    #[test]
    fn test_packet_path_grows_by_visit() {
        let mut packet = Packet::new(PacketKind::Data, id("0"), id("2"), None);
        assert!(packet.path().is_empty());
        assert_eq!(packet.hops(), 0);

        packet.visit(&id("0"));
        packet.visit(&id("1"));
        assert_eq!(packet.path(), &[id("0"), id("1")]);
        assert_eq!(packet.hops(), 1);
    }

    #[test]
    fn test_packet_revisit_detection() {
        let mut packet = Packet::new(PacketKind::Data, id("0"), id("3"), None);
        for hop in ["0", "1", "2"] {
            packet.visit(&id(hop));
        }
        assert!(!packet.has_revisited());

        packet.visit(&id("1"));
        assert!(packet.has_revisited());
    }

    #[test]
    fn test_link_key_is_unordered() {
        assert_eq!(LinkKey::new(id("0"), id("2")), LinkKey::new(id("2"), id("0")));
        let key = LinkKey::new(id("5"), id("4"));
        assert_eq!(key.ends(), (&id("4"), &id("5")));
        assert!(key.touches(&id("5")));
        assert!(!key.touches(&id("6")));
    }

    #[test]
    fn test_packet_display() {
        let mut packet = Packet::new(PacketKind::Ack, id("2"), id("0"), Some("hi".into()));
        packet.route = vec![id("2"), id("0")];
        packet.visit(&id("2"));
        assert_eq!(
            packet.to_string(),
            "Data: hi, Type: ACK, Source: 2, Destination: 0, Routing: ['2', '0'], Path: ['2']"
        );
    }
}
