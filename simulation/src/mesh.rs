//! Tick scheduler for the whole mesh
//!
//! [`Mesh`] owns every node, the set of dead links, the tick clock with its
//! event log, and the accumulated metrics. One call to [`Mesh::run`] is one
//! tick: random failures are rolled, then every node gets one chance to move
//! the head of its buffer, in node id order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use meshroute_logging::NodeContextGuard;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, trace};

use crate::config::{FailureKind, SimConfig, check_chance};
use crate::error::{SimError, SimResult};
use crate::events::{EventKind, EventLog, EventSink, MeshEvent};
use crate::metrics::{MeshMetrics, MetricsReport};
use crate::node::{Fabric, Node};
use crate::topology::TopologySpec;
use crate::types::{LinkKey, NodeId, Packet, PacketKind};

/// Average buffer occupancy reported when every buffer is empty
pub const EMPTY_BUFFERS: f64 = -1.0;

/// What one node sees of the rest of the mesh while it runs
///
/// The running node is taken out of `nodes` for the duration, so a hand-off
/// is the only way a packet reaches another node's buffer.
struct TickContext<'a> {
    nodes: &'a mut BTreeMap<NodeId, Node>,
    dead_links: &'a BTreeSet<LinkKey>,
    log: &'a mut EventLog,
    metrics: &'a mut MeshMetrics,
}

impl EventSink for TickContext<'_> {
    fn record(&mut self, node: &NodeId, kind: EventKind) {
        self.log.record(node, kind);
    }
}

impl Fabric for TickContext<'_> {
    fn link_up(&self, from: &NodeId, to: &NodeId) -> bool {
        !self
            .dead_links
            .contains(&LinkKey::new(from.clone(), to.clone()))
    }

    fn hand_off(&mut self, to: &NodeId, packet: Packet) -> Result<(), Packet> {
        match self.nodes.get_mut(to) {
            Some(peer) => peer.receive(packet, false, &mut *self.log),
            None => Err(packet),
        }
    }

    fn metrics(&mut self) -> &mut MeshMetrics {
        &mut *self.metrics
    }
}

/// A simulated mesh network
#[derive(Debug)]
pub struct Mesh {
    spec: TopologySpec,
    nodes: BTreeMap<NodeId, Node>,
    dead_links: BTreeSet<LinkKey>,
    log: EventLog,
    config: SimConfig,
    rng: StdRng,
    metrics: MeshMetrics,
}

impl Mesh {
    /// Build a mesh from a validated topology
    ///
    /// Every node starts up with an empty buffer. Call
    /// [`generate_topology`](Self::generate_topology) before routing anything.
    pub fn new(spec: TopologySpec, config: SimConfig) -> SimResult<Self> {
        config.validate()?;

        let nodes = spec
            .node_ids()
            .map(|id| (id.clone(), Node::new(id.clone(), spec.links(id).to_vec())))
            .collect();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            spec,
            nodes,
            dead_links: BTreeSet::new(),
            log: EventLog::new(),
            config,
            rng,
            metrics: MeshMetrics::default(),
        })
    }

    pub fn from_json(json: &str, config: SimConfig) -> SimResult<Self> {
        Self::new(TopologySpec::from_json(json)?, config)
    }

    /// Enumerate the path set of every node
    pub fn generate_topology(&mut self) {
        self.log.record_mesh(EventKind::TopologyGenerated);
        for node in self.nodes.values_mut() {
            node.generate_topology(&self.spec, self.config.max_paths_per_node);
        }
        info!(
            nodes = self.nodes.len(),
            average_paths = self.average_topology_size(),
            "Mesh topology generated"
        );
    }

    /// Advance the mesh by one tick
    pub fn run(&mut self) {
        self.run_sparing(&[]);
    }

    /// Advance one tick, never failing any node in `never_fail`
    pub fn run_sparing(&mut self, never_fail: &[NodeId]) {
        // Ticks are only charged once something happened
        if !self.log.is_empty() {
            self.log.advance();
            let sample = self.average_buffer().unwrap_or(EMPTY_BUFFERS);
            self.metrics.record_congestion(sample);
        }
        self.log.clear();
        trace!("=== Tick {} ===", self.log.tick());

        for kind in FailureKind::ALL {
            let chance = self.config.fail_chance(kind);
            if chance > 0 {
                self.roll_failure(kind, chance, never_fail);
            }
        }

        let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        for id in ids {
            let Some(mut node) = self.nodes.remove(&id) else {
                continue;
            };
            let result = {
                let _context = NodeContextGuard::new(&id);
                let mut context = TickContext {
                    nodes: &mut self.nodes,
                    dead_links: &self.dead_links,
                    log: &mut self.log,
                    metrics: &mut self.metrics,
                };
                node.run(&mut context)
            };
            self.nodes.insert(id.clone(), node);

            match result {
                Ok(outcome) => trace!(node = %id, ?outcome, "Node ran"),
                Err(err) => self.invariant_broken(&id, err),
            }
        }
    }

    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.run();
        }
    }

    fn invariant_broken(&mut self, node: &NodeId, err: SimError) {
        error!(node = %node, error = %err, "Packet dropped");
        if let SimError::RoutingInvariant { next_hop, .. } = err {
            self.log
                .record(node, EventKind::RoutingInvariant { next_hop });
            self.metrics.record_invariant_violation();
        }
    }

    /// Roll one random failure of `kind` with a `chance` percent probability
    ///
    /// Returns whether something was toggled.
    pub fn rand_fail(
        &mut self,
        kind: FailureKind,
        chance: u8,
        never_fail: &[NodeId],
    ) -> SimResult<bool> {
        check_chance(chance)?;
        Ok(self.roll_failure(kind, chance, never_fail))
    }

    fn roll_failure(&mut self, kind: FailureKind, chance: u8, never_fail: &[NodeId]) -> bool {
        let roll: u8 = self.rng.random_range(1..=100);
        if roll > chance {
            return false;
        }

        let ids: Vec<&NodeId> = self.nodes.keys().collect();
        let Some(chosen) = ids.choose(&mut self.rng).map(|id| (*id).clone()) else {
            return false;
        };
        if never_fail.contains(&chosen) {
            debug!(node = %chosen, %kind, "Random failure spared node");
            return false;
        }

        match kind {
            FailureKind::Node => {
                let Some(node) = self.nodes.get_mut(&chosen) else {
                    return false;
                };
                let event = if node.toggle() {
                    EventKind::NodeUp(chosen.clone())
                } else {
                    EventKind::NodeDown(chosen.clone())
                };
                info!(node = %chosen, up = node.is_up(), "Random node toggle");
                self.log.record_mesh(event);
            }
            FailureKind::Link => {
                let Some(peer) = self
                    .nodes
                    .get(&chosen)
                    .and_then(|node| node.links().choose(&mut self.rng))
                    .cloned()
                else {
                    debug!(node = %chosen, "Random link failure skipped node without links");
                    return false;
                };
                info!(a = %chosen, b = %peer, "Random link toggle");
                self.toggle_link(&chosen, &peer);
            }
        }
        true
    }

    /// Flip a link between dead and alive, returning whether it is now up
    ///
    /// Orientation does not matter and the link need not exist.
    pub fn toggle_link(&mut self, a: &NodeId, b: &NodeId) -> bool {
        let key = LinkKey::new(a.clone(), b.clone());
        let (a, b) = (a.clone(), b.clone());
        if self.dead_links.remove(&key) {
            self.log.record_mesh(EventKind::LinkUp { a, b });
            true
        } else {
            self.dead_links.insert(key);
            self.log.record_mesh(EventKind::LinkDown { a, b });
            false
        }
    }

    pub fn link_status(&self, a: &NodeId, b: &NodeId) -> bool {
        !self.dead_links.contains(&LinkKey::new(a.clone(), b.clone()))
    }

    /// Flip a node between up and down, returning whether it is now up
    pub fn toggle_node(&mut self, id: &NodeId) -> SimResult<bool> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| SimError::UnknownNode(id.clone()))?;
        let up = node.toggle();
        info!(node = %id, up, "Node toggled");
        Ok(up)
    }

    /// Bring every link and node back up
    ///
    /// Buffers, metrics and the tick clock are left alone.
    pub fn restore(&mut self) {
        self.dead_links.clear();
        for node in self.nodes.values_mut() {
            node.set_up(true);
        }
        self.log.record_mesh(EventKind::Restored);
        info!("Mesh restored");
    }

    pub fn set_fail_chance(&mut self, kind: FailureKind, chance: u8) -> SimResult<()> {
        check_chance(chance)?;
        self.config.set_fail_chance(kind, chance);
        Ok(())
    }

    pub fn fail_chance(&self, kind: FailureKind) -> u8 {
        self.config.fail_chance(kind)
    }

    /// Queue a new data packet at `source`
    ///
    /// Returns `Ok(false)` when the source is down and the packet is lost.
    pub fn generate_packet(
        &mut self,
        source: &NodeId,
        destination: &NodeId,
        payload: Option<String>,
    ) -> SimResult<bool> {
        if !self.nodes.contains_key(destination) {
            return Err(SimError::UnknownNode(destination.clone()));
        }
        let node = self
            .nodes
            .get_mut(source)
            .ok_or_else(|| SimError::UnknownNode(source.clone()))?;
        Ok(node.generate_packet(PacketKind::Data, destination.clone(), payload, &mut self.log))
    }

    /// Unique undirected links of the topology
    pub fn get_links(&self) -> Vec<(NodeId, NodeId)> {
        self.spec.unique_links()
    }

    /// Mean buffer length over nodes with something buffered, `None` when
    /// every buffer is empty
    pub fn average_buffer(&self) -> Option<f64> {
        let sizes: Vec<usize> = self
            .nodes
            .values()
            .map(|node| node.buffer().len())
            .filter(|&len| len > 0)
            .collect();
        if sizes.is_empty() {
            return None;
        }
        Some(sizes.iter().sum::<usize>() as f64 / sizes.len() as f64)
    }

    /// Mean number of enumerated paths per node
    pub fn average_topology_size(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let total: usize = self.nodes.values().map(|node| node.topology().len()).sum();
        total as f64 / self.nodes.len() as f64
    }

    pub fn metrics(&self) -> &MeshMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.clear();
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            ticks: self.log.tick(),
            node_fail_chance: self.fail_chance(FailureKind::Node),
            link_fail_chance: self.fail_chance(FailureKind::Link),
            delivered: self.metrics.delivered(),
            average_hops: self.metrics.average_hops(),
            average_congestion: self.metrics.average_congestion(),
            errors: self.metrics.errors,
            unreached: self.metrics.unreached,
            round_trips: self.metrics.round_trips,
            invariant_violations: self.metrics.invariant_violations,
        }
    }

    pub fn tick(&self) -> u64 {
        self.log.tick()
    }

    /// Events recorded since the start of the current tick
    pub fn events(&self) -> &[MeshEvent] {
        self.log.entries()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn dead_links(&self) -> impl Iterator<Item = &LinkKey> {
        self.dead_links.iter()
    }

    pub fn spec(&self) -> &TopologySpec {
        &self.spec
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Network status flags followed by the events of the current tick
    pub fn status_summary(&self) -> String {
        let mut out = String::from("Network status flags:\n");
        for node in self.nodes.values().filter(|node| !node.is_up()) {
            let _ = writeln!(out, "    Node {} down", node.id());
        }
        for link in &self.dead_links {
            let _ = writeln!(out, "    Link {link} down");
        }
        for node in self.nodes.values().filter(|node| !node.buffer().is_empty()) {
            let _ = writeln!(
                out,
                "    Node {} has {} packets pending",
                node.id(),
                node.buffer().len()
            );
        }
        out.push_str("--------------\n");
        let _ = writeln!(out, "Network events for tick {}:", self.tick());
        for event in self.events() {
            let marker = if event.is_failure() { "  ! " } else { "    " };
            let _ = writeln!(out, " {marker}{event}");
        }
        out.push_str("--------------");
        out
    }
}
