//! Mesh topology input and per-node path enumeration
//!
//! [`TopologySpec`] is the static link graph the mesh is built from: a map
//! from node id to its ordered link list. [`PathSet`] is one node's view of
//! that graph: every simple path starting at the node, which routing later
//! draws its candidates from.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::types::{LinkKey, NodeId, Path};

/// Static link graph of a mesh
///
/// Link lists keep their input order, which decides enumeration order and
/// therefore the tie-break between equally short routes. Symmetry is the
/// caller's responsibility: a link listed on one side only is one-directional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopologySpec {
    links: BTreeMap<NodeId, Vec<NodeId>>,
}

impl TopologySpec {
    /// Build a spec from a node-to-links map, validating every reference
    pub fn new(links: BTreeMap<NodeId, Vec<NodeId>>) -> SimResult<Self> {
        let spec = Self { links };
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a JSON object such as `{"0": ["1"], "1": ["0"]}`
    pub fn from_json(json: &str) -> SimResult<Self> {
        let links: BTreeMap<NodeId, Vec<NodeId>> = serde_json::from_str(json)?;
        Self::new(links)
    }

    pub fn from_reader(reader: impl Read) -> SimResult<Self> {
        let links: BTreeMap<NodeId, Vec<NodeId>> = serde_json::from_reader(reader)?;
        Self::new(links)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> SimResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Build a symmetric spec from an edge list, in edge order
    pub fn from_edges(edges: &[(&str, &str)]) -> SimResult<Self> {
        let mut links: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (a, b) in edges {
            let (a, b) = (NodeId::from(*a), NodeId::from(*b));
            links.entry(a.clone()).or_default().push(b.clone());
            links.entry(b).or_default().push(a);
        }
        Self::new(links)
    }

    fn validate(&self) -> SimResult<()> {
        for (node, peers) in &self.links {
            if node.as_str().is_empty() {
                return Err(SimError::EmptyNodeId);
            }
            if let Some(peer) = peers.iter().find(|p| !self.links.contains_key(*p)) {
                return Err(SimError::UnknownPeer {
                    node: node.clone(),
                    peer: peer.clone(),
                });
            }
        }
        Ok(())
    }

    /// Direct links of `node`, empty for unknown ids
    pub fn links(&self, node: &NodeId) -> &[NodeId] {
        self.links.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Node ids in mesh order
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.links.keys()
    }

    pub fn node_count(&self) -> usize {
        self.links.len()
    }

    /// Unique undirected links, in mesh order then link-list order
    pub fn unique_links(&self) -> Vec<(NodeId, NodeId)> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for (node, peers) in &self.links {
            for peer in peers {
                if seen.insert(LinkKey::new(node.clone(), peer.clone())) {
                    unique.push((node.clone(), peer.clone()));
                }
            }
        }
        unique
    }

    pub fn link_count(&self) -> usize {
        self.unique_links().len()
    }

    /// Print a simple ASCII visualization of the mesh
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Mesh Topology:\n");
        output.push_str(&format!("  Nodes: {}\n", self.node_count()));
        output.push_str(&format!("  Links: {}\n\n", self.link_count()));

        for (node, peers) in &self.links {
            let peer_str: Vec<&str> = peers.iter().map(NodeId::as_str).collect();
            output.push_str(&format!("  {} -> [{}]\n", node, peer_str.join(", ")));
        }
        output
    }
}

/// Every simple path reachable from one node
///
/// Each recorded path starts at the origin, never repeats a node, and every
/// prefix of a recorded path is itself recorded. The set is computed once and
/// never reacts to failures.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    paths: Vec<Path>,
    /// Indices into `paths` per final node, stably ordered by path length
    by_destination: HashMap<NodeId, Vec<usize>>,
}

impl PathSet {
    /// Enumerate paths from `origin` by depth-first expansion over `graph`
    ///
    /// Expansion visits links in list order, so the result matches a
    /// recursive walk exactly; an explicit stack keeps deep meshes off the
    /// call stack. The count grows combinatorially with connectivity;
    /// `cap` stops recording once that many paths exist.
    pub fn enumerate(origin: &NodeId, graph: &TopologySpec, cap: Option<usize>) -> Self {
        let mut paths: Vec<Path> = Vec::new();
        // Each frame is a path and the index of the next link to try from its tail
        let mut stack: Vec<(Path, usize)> = vec![(vec![origin.clone()], 0)];

        while let Some((path, next)) = stack.last_mut() {
            let Some(tail) = path.last() else {
                break;
            };
            let links = graph.links(tail);
            if *next >= links.len() {
                stack.pop();
                continue;
            }
            let index = *next;
            *next += 1;

            let link = &links[index];
            // Revisits break the simple-path property; a repeated entry in the
            // link list would record the same path twice
            if path.contains(link) || links[..index].contains(link) {
                continue;
            }

            let mut extended = path.clone();
            extended.push(link.clone());
            paths.push(extended.clone());
            if cap.is_some_and(|cap| paths.len() >= cap) {
                debug!(origin = %origin, cap = paths.len(), "Path enumeration capped");
                break;
            }
            stack.push((extended, 0));
        }

        Self::from_paths(paths)
    }

    fn from_paths(paths: Vec<Path>) -> Self {
        let mut by_destination: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (index, path) in paths.iter().enumerate() {
            if let Some(last) = path.last() {
                by_destination.entry(last.clone()).or_default().push(index);
            }
        }
        for indices in by_destination.values_mut() {
            // Stable: equal lengths keep enumeration order
            indices.sort_by_key(|&i| paths[i].len());
        }
        Self {
            paths,
            by_destination,
        }
    }

    /// All recorded paths in enumeration order
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths ending at `destination`, shortest first, ties in enumeration order
    pub fn candidates<'a>(&'a self, destination: &NodeId) -> impl Iterator<Item = &'a Path> + use<'a> {
        self.by_destination
            .get(destination)
            .into_iter()
            .flatten()
            .map(|&i| &self.paths[i])
    }

    /// Whether any recorded path ends at `destination`
    pub fn reaches(&self, destination: &NodeId) -> bool {
        self.by_destination.contains_key(destination)
    }
}
