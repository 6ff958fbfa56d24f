//! Local route selection
//!
//! A node routes using only its own [`PathSet`] and the failures it has run
//! into during the current tick. Nothing here looks at mesh-wide state.

use std::collections::HashSet;

use crate::topology::PathSet;
use crate::types::{NodeId, Packet, Path};

/// Something a node failed to get through this tick
///
/// Node and link failures are kept in one set on purpose: a sender cannot
/// tell whether the peer or the link to it is down.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Avoid {
    Node(NodeId),
    Link(NodeId, NodeId),
}

/// Per-tick failure memory of one node
#[derive(Debug, Clone, Default)]
pub struct AvoidanceMemory {
    entries: HashSet<Avoid>,
}

impl AvoidanceMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: Avoid) {
        self.entries.insert(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether `path` passes through an avoided node or crosses an avoided
    /// link in either direction
    pub fn excludes(&self, path: &[NodeId]) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        if path
            .iter()
            .any(|node| self.entries.contains(&Avoid::Node(node.clone())))
        {
            return true;
        }
        path.windows(2).any(|edge| {
            self.entries
                .contains(&Avoid::Link(edge[0].clone(), edge[1].clone()))
                || self
                    .entries
                    .contains(&Avoid::Link(edge[1].clone(), edge[0].clone()))
        })
    }
}

/// Choose a route from `origin` for `packet`
///
/// Candidates ending at the destination are tried shortest first. The first
/// one that avoids both remembered failures and every node the packet has
/// already traveled through wins. If none does, the last candidate rejected
/// only for retracing old ground is used, unless the packet has already
/// revisited a node. An empty path means no route.
pub fn select_route(
    origin: &NodeId,
    paths: &PathSet,
    avoid: &AvoidanceMemory,
    packet: &Packet,
) -> Path {
    if &packet.destination == origin {
        return vec![origin.clone()];
    }

    let mut alternate: Option<&Path> = None;
    for candidate in paths.candidates(&packet.destination) {
        if avoid.excludes(candidate) {
            continue;
        }
        let retraces = candidate[1..]
            .iter()
            .any(|node| packet.path().contains(node));
        if !retraces {
            return candidate.clone();
        }
        alternate = Some(candidate);
    }

    match alternate {
        Some(path) if !packet.has_revisited() => path.clone(),
        _ => Vec::new(),
    }
}
