//! A single mesh node
//!
//! A node knows its own links, every simple path starting at itself, and
//! the failures it ran into during the current tick. It never looks at
//! mesh-wide state directly: link status, peer hand-off, event logging and
//! metrics all go through a [`Fabric`] supplied by the scheduler for the
//! duration of one call.

use std::collections::VecDeque;

use tracing::{debug, instrument, trace, warn};

use crate::error::{SimError, SimResult};
use crate::events::{EventKind, EventSink};
use crate::metrics::MeshMetrics;
use crate::routing::{Avoid, AvoidanceMemory, select_route};
use crate::topology::{PathSet, TopologySpec};
use crate::types::{NodeId, Packet, PacketKind, Path};

/// The part of the mesh a node can see while it runs
pub trait Fabric: EventSink {
    /// Whether the link between `from` and `to` is currently alive
    fn link_up(&self, from: &NodeId, to: &NodeId) -> bool;

    /// Hand `packet` to the node `to`
    ///
    /// The receiver takes ownership on success. On rejection (receiver
    /// down or unknown) the packet comes back untouched.
    fn hand_off(&mut self, to: &NodeId, packet: Packet) -> Result<(), Packet>;

    fn metrics(&mut self) -> &mut MeshMetrics;
}

/// What a node did with its tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Buffer was empty
    Idle,
    /// Node is down and keeps its buffer
    Down,
    /// A packet arrived earlier this tick; processing waits for the next one
    Deferred,
    /// A data packet reached this node and an acknowledgement was queued
    Delivered { hops: usize },
    /// An acknowledgement made it back to this node
    RoundTrip,
    /// The head packet moved one hop along its route
    Forwarded,
    /// No route was left for the head packet and it was dropped
    Unreachable,
}

/// Result of one attempt at moving a packet
#[derive(Debug)]
enum Attempt {
    Completed(NodeOutcome),
    Rejected(Packet),
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    up: bool,
    links: Vec<NodeId>,
    buffer: VecDeque<Packet>,
    topology: PathSet,
    avoid: AvoidanceMemory,
    /// Set when a peer handed over a packet this tick
    received: bool,
}

impl Node {
    pub fn new(id: NodeId, links: Vec<NodeId>) -> Self {
        Self {
            id,
            up: true,
            links,
            buffer: VecDeque::new(),
            topology: PathSet::default(),
            avoid: AvoidanceMemory::new(),
            received: false,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn links(&self) -> &[NodeId] {
        &self.links
    }

    pub fn buffer(&self) -> &VecDeque<Packet> {
        &self.buffer
    }

    pub fn topology(&self) -> &PathSet {
        &self.topology
    }

    pub fn avoidance(&self) -> &AvoidanceMemory {
        &self.avoid
    }

    /// Whether processing is deferred to the next tick
    pub fn just_received(&self) -> bool {
        self.received
    }

    /// Flip the up/down status, returning the new status
    pub fn toggle(&mut self) -> bool {
        self.up = !self.up;
        self.up
    }

    pub(crate) fn set_up(&mut self, up: bool) {
        self.up = up;
    }

    /// Enumerate every simple path from this node over `graph`
    pub fn generate_topology(&mut self, graph: &TopologySpec, cap: Option<usize>) {
        self.topology = PathSet::enumerate(&self.id, graph, cap);
        debug!(node = %self.id, paths = self.topology.len(), "Generated topology");
    }

    /// Best route from here for `packet`, empty if none
    pub fn find_route(&self, packet: &Packet) -> Path {
        let route = select_route(&self.id, &self.topology, &self.avoid, packet);
        trace!(node = %self.id, destination = %packet.destination, route = ?route, "Route selected");
        route
    }

    /// Create a packet originating here and queue it locally
    ///
    /// Returns false if the node is down, in which case the packet is lost.
    pub fn generate_packet(
        &mut self,
        kind: PacketKind,
        destination: NodeId,
        payload: Option<String>,
        sink: &mut impl EventSink,
    ) -> bool {
        let mut packet = Packet::new(kind, self.id.clone(), destination, payload);
        packet.route = self.find_route(&packet);
        self.receive(packet, true, sink).is_ok()
    }

    /// Accept a packet into the buffer
    ///
    /// `generated` marks packets created by this node; those do not defer
    /// processing. A down node hands the packet back unchanged.
    pub(crate) fn receive(
        &mut self,
        mut packet: Packet,
        generated: bool,
        sink: &mut impl EventSink,
    ) -> Result<(), Packet> {
        if !self.up {
            sink.record(&self.id, EventKind::ReceiveRejected(packet.clone()));
            return Err(packet);
        }

        packet.visit(&self.id);
        let event = if generated {
            EventKind::PacketCreated(packet.clone())
        } else {
            self.received = true;
            EventKind::Received(packet.clone())
        };
        self.buffer.push_back(packet);
        sink.record(&self.id, event);
        Ok(())
    }

    /// Process the head of the buffer for one tick
    ///
    /// Exactly one packet leaves the buffer unless the node is idle, down or
    /// deferred. Transmission failures are retried over fresh routes until
    /// one succeeds or none is left. A route whose next hop is not a direct
    /// link aborts the packet with [`SimError::RoutingInvariant`].
    #[instrument(skip(self, fabric), fields(node = %self.id, buffered = self.buffer.len()))]
    pub fn run(&mut self, fabric: &mut impl Fabric) -> SimResult<NodeOutcome> {
        self.avoid.clear();

        if self.buffer.is_empty() {
            return Ok(NodeOutcome::Idle);
        }
        if !self.up {
            return Ok(NodeOutcome::Down);
        }
        if self.received {
            self.received = false;
            return Ok(NodeOutcome::Deferred);
        }

        let Some(mut packet) = self.buffer.pop_front() else {
            return Ok(NodeOutcome::Idle);
        };

        loop {
            match self.process(packet, fabric)? {
                Attempt::Completed(outcome) => return Ok(outcome),
                Attempt::Rejected(returned) => {
                    packet = returned;
                    packet.route = self.find_route(&packet);
                    if packet.route.is_empty() {
                        warn!(node = %self.id, destination = %packet.destination, "No route left for packet");
                        fabric.record(&self.id, EventKind::Unreachable(packet));
                        fabric.metrics().record_unreached();
                        return Ok(NodeOutcome::Unreachable);
                    }
                }
            }
        }
    }

    fn process(&mut self, packet: Packet, fabric: &mut impl Fabric) -> SimResult<Attempt> {
        if packet.destination != self.id {
            return self.send(packet, fabric);
        }

        match packet.kind {
            PacketKind::Data => {
                let hops = packet.hops();
                debug!(node = %self.id, source = %packet.source, hops, "Data packet delivered");
                self.generate_packet(PacketKind::Ack, packet.source, None, fabric);
                fabric.metrics().record_hops(hops);
                Ok(Attempt::Completed(NodeOutcome::Delivered { hops }))
            }
            PacketKind::Ack => {
                debug!(node = %self.id, "Acknowledgement returned");
                fabric.record(
                    &self.id,
                    EventKind::RoundTrip {
                        source: self.id.clone(),
                    },
                );
                fabric.metrics().record_round_trip();
                Ok(Attempt::Completed(NodeOutcome::RoundTrip))
            }
        }
    }

    /// Send along the packet's route, planning one first if the current
    /// route is missing or does not pass through this node
    fn send(&mut self, mut packet: Packet, fabric: &mut impl Fabric) -> SimResult<Attempt> {
        if !packet.route.contains(&self.id) {
            packet.route = self.find_route(&packet);
        }
        let Some(position) = packet.route.iter().position(|hop| hop == &self.id) else {
            return Ok(Attempt::Rejected(packet));
        };
        let next_hop = packet
            .route
            .get(position + 1)
            .cloned()
            .unwrap_or_else(|| self.id.clone());
        self.transmit(next_hop, packet, fabric)
    }

    fn transmit(
        &mut self,
        target: NodeId,
        packet: Packet,
        fabric: &mut impl Fabric,
    ) -> SimResult<Attempt> {
        if target == self.id {
            return Ok(match self.receive(packet, false, fabric) {
                Ok(()) => Attempt::Completed(NodeOutcome::Forwarded),
                Err(packet) => Attempt::Rejected(packet),
            });
        }

        fabric.record(&self.id, EventKind::SendAttempt { to: target.clone() });

        if !self.links.contains(&target) {
            return Err(SimError::RoutingInvariant {
                node: self.id.clone(),
                next_hop: target,
            });
        }
        if !fabric.link_up(&self.id, &target) {
            return Ok(self.transmission_failed(target, packet, fabric));
        }

        let mut sent = packet.clone();
        match fabric.hand_off(&target, packet) {
            Ok(()) => {
                trace!(node = %self.id, to = %target, "Packet transmitted");
                sent.visit(&target);
                fabric.record(&self.id, EventKind::Transmitted(sent));
                Ok(Attempt::Completed(NodeOutcome::Forwarded))
            }
            Err(packet) => Ok(self.transmission_failed(target, packet, fabric)),
        }
    }

    /// A dead link and a dead peer look the same from here, so both are
    /// remembered as the link
    fn transmission_failed(
        &mut self,
        target: NodeId,
        packet: Packet,
        fabric: &mut impl Fabric,
    ) -> Attempt {
        debug!(node = %self.id, to = %target, "Transmission failed");
        self.avoid.insert(Avoid::Link(self.id.clone(), target.clone()));
        fabric.record(&self.id, EventKind::SendFailed { to: target });
        fabric.metrics().record_error();
        Attempt::Rejected(packet)
    }
}
