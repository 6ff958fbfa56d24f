//! Built-in meshes and the throughput scenario
//!
//! The assignment mesh is the 16-node reference network; the abridged mesh
//! is the same network with everything past node 9 removed; the throughput
//! mesh is a 12-node grid that funnels traffic from nodes 0 and 1 towards 11.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::FailureKind;
use crate::error::{SimError, SimResult};
use crate::mesh::Mesh;
use crate::metrics::MetricsReport;
use crate::topology::TopologySpec;
use crate::types::NodeId;

const ASSIGNMENT: &str = r#"{
    "0": ["1", "3"],
    "1": ["0", "2", "4"],
    "2": ["1"],
    "3": ["0", "4", "6"],
    "4": ["1", "3", "5", "7"],
    "5": ["4", "8", "9"],
    "6": ["3"],
    "7": ["4", "8"],
    "8": ["5", "7"],
    "9": ["5", "10"],
    "10": ["9", "11", "13"],
    "11": ["10", "12", "13", "14", "15"],
    "12": ["11", "15"],
    "13": ["10", "11", "14"],
    "14": ["11", "13", "15"],
    "15": ["11", "12", "14"]
}"#;

const ABRIDGED: &str = r#"{
    "0": ["1", "3"],
    "1": ["0", "2", "4"],
    "2": ["1"],
    "3": ["0", "4", "6"],
    "4": ["1", "3", "5", "7"],
    "5": ["4", "8"],
    "6": ["3"],
    "7": ["4", "8"],
    "8": ["5", "7"]
}"#;

// 11 lists 9 but 9 does not list 11, so that link only carries traffic 11 -> 9
const THROUGHPUT: &str = r#"{
    "0": ["2", "3"],
    "1": ["3", "4"],
    "2": ["0", "3", "5"],
    "3": ["0", "1", "2", "4", "6"],
    "4": ["1", "3", "7"],
    "5": ["2", "6", "8"],
    "6": ["3", "5", "7", "9"],
    "7": ["4", "6", "10"],
    "8": ["5", "9", "11"],
    "9": ["6", "8", "10"],
    "10": ["7", "9", "11"],
    "11": ["8", "9", "10"]
}"#;

const TRIANGLE: &str = r#"{"0": ["1", "2"], "1": ["0", "2"], "2": ["0", "1"]}"#;

/// One of the meshes shipped with the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinMesh {
    Assignment,
    Abridged,
    Throughput,
    Triangle,
}

impl BuiltinMesh {
    pub const ALL: [BuiltinMesh; 4] = [
        BuiltinMesh::Assignment,
        BuiltinMesh::Abridged,
        BuiltinMesh::Throughput,
        BuiltinMesh::Triangle,
    ];

    pub fn json(self) -> &'static str {
        match self {
            BuiltinMesh::Assignment => ASSIGNMENT,
            BuiltinMesh::Abridged => ABRIDGED,
            BuiltinMesh::Throughput => THROUGHPUT,
            BuiltinMesh::Triangle => TRIANGLE,
        }
    }

    pub fn spec(self) -> SimResult<TopologySpec> {
        TopologySpec::from_json(self.json())
    }

    /// Node the throughput scenario sends traffic to
    pub fn default_target(self) -> NodeId {
        let target = match self {
            BuiltinMesh::Assignment => "12",
            BuiltinMesh::Abridged => "8",
            BuiltinMesh::Throughput => "11",
            BuiltinMesh::Triangle => "2",
        };
        NodeId::from(target)
    }

    pub fn description(self) -> &'static str {
        match self {
            BuiltinMesh::Assignment => "Project assignment mesh (16 nodes)",
            BuiltinMesh::Abridged => "Assignment mesh with everything right of node 9 removed",
            BuiltinMesh::Throughput => "Throughput test grid, from 0 and 1 to 11 and back",
            BuiltinMesh::Triangle => "Three fully linked nodes",
        }
    }
}

impl fmt::Display for BuiltinMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuiltinMesh::Assignment => "assignment",
            BuiltinMesh::Abridged => "abridged",
            BuiltinMesh::Throughput => "throughput",
            BuiltinMesh::Triangle => "triangle",
        };
        f.write_str(name)
    }
}

impl FromStr for BuiltinMesh {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        BuiltinMesh::ALL
            .into_iter()
            .find(|mesh| mesh.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| SimError::Config(format!("unknown built-in mesh '{s}'")))
    }
}

/// The 16-node reference mesh
pub fn assignment() -> SimResult<TopologySpec> {
    BuiltinMesh::Assignment.spec()
}

/// The reference mesh cut off at node 9
pub fn abridged() -> SimResult<TopologySpec> {
    BuiltinMesh::Abridged.spec()
}

/// The 12-node throughput grid
pub fn throughput() -> SimResult<TopologySpec> {
    BuiltinMesh::Throughput.spec()
}

pub fn triangle() -> SimResult<TopologySpec> {
    BuiltinMesh::Triangle.spec()
}

/// Repeated traffic from the first two nodes towards one target
///
/// Each round both origins generate one data packet for the target, until
/// `packets_per_origin` rounds have generated. The mesh then keeps ticking
/// until every buffer is empty or the configured round cap is passed.
#[derive(Debug, Clone)]
pub struct ThroughputRun {
    pub target: NodeId,
    pub packets_per_origin: u64,
    pub node_fail_chance: u8,
    pub link_fail_chance: u8,
}

/// Result of a [`ThroughputRun`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputOutcome {
    pub report: MetricsReport,
    /// Ticks run by the scenario
    pub rounds: u64,
    /// The round cap was passed with packets still buffered
    pub timed_out: bool,
}

impl ThroughputRun {
    pub fn new(target: impl Into<NodeId>) -> Self {
        Self {
            target: target.into(),
            packets_per_origin: 10,
            node_fail_chance: 0,
            link_fail_chance: 0,
        }
    }

    /// Default run for a built-in mesh
    pub fn for_builtin(mesh: BuiltinMesh) -> Self {
        Self::new(mesh.default_target())
    }

    pub fn with_packets(mut self, packets_per_origin: u64) -> Self {
        self.packets_per_origin = packets_per_origin;
        self
    }

    pub fn with_fail_chance(mut self, kind: FailureKind, chance: u8) -> Self {
        match kind {
            FailureKind::Node => self.node_fail_chance = chance,
            FailureKind::Link => self.link_fail_chance = chance,
        }
        self
    }

    /// Restore `mesh`, apply this run's failure chances and drive it to
    /// completion
    pub fn run(&self, mesh: &mut Mesh) -> SimResult<ThroughputOutcome> {
        if mesh.node(&self.target).is_none() {
            return Err(SimError::UnknownNode(self.target.clone()));
        }

        mesh.restore();
        mesh.reset_metrics();
        mesh.set_fail_chance(FailureKind::Node, self.node_fail_chance)?;
        mesh.set_fail_chance(FailureKind::Link, self.link_fail_chance)?;

        let origins: Vec<NodeId> = mesh.node_ids().take(2).cloned().collect();
        let cap = mesh.config().max_generation_rounds;
        info!(
            destination = %self.target,
            origins = ?origins,
            packets = self.packets_per_origin,
            "Starting throughput run"
        );

        let mut rounds = 0;
        loop {
            if rounds < self.packets_per_origin {
                for origin in &origins {
                    mesh.generate_packet(origin, &self.target, None)?;
                }
            }
            if mesh.average_buffer().is_none() || rounds > cap {
                break;
            }
            mesh.run();
            rounds += 1;
        }

        let timed_out = rounds > cap;
        if timed_out {
            warn!(rounds, "Throughput run timed out with packets still buffered");
        }
        Ok(ThroughputOutcome {
            report: mesh.report(),
            rounds,
            timed_out,
        })
    }
}
