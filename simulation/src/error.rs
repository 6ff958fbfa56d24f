//! Error types for the mesh simulator
//!
//! Only malformed input and broken routing invariants become errors.
//! Transmission failures and unreachable destinations are expected outcomes
//! and are reported through events and metrics instead.

use thiserror::Error;

use crate::types::NodeId;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Topology parse error: {0}")]
    TopologyParse(#[from] serde_json::Error),

    #[error("Topology I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Node id must not be empty")]
    EmptyNodeId,

    #[error("Node {node} links to unknown node {peer}")]
    UnknownPeer { node: NodeId, peer: NodeId },

    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    /// A computed route named a next hop that is not a direct link.
    /// Indicates a defect in topology enumeration or route selection.
    #[error("Routing invariant violated: node {node} has no link to next hop {next_hop}")]
    RoutingInvariant { node: NodeId, next_hop: NodeId },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for simulator operations
pub type SimResult<T> = Result<T, SimError>;
