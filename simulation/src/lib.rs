//! # meshroute
//!
//! A tick-based simulator for packet routing across a mesh of nodes that
//! only know their own links.
//!
//! ## Overview
//!
//! Every node enumerates, once, all simple paths that start at itself. When
//! it has to move a packet it picks the shortest of those paths that avoids
//! both the failures it already ran into this tick and the nodes the packet
//! has already traveled through. No node ever sees mesh-wide state, so the
//! routing can be suboptimal or loop locally. Delivery is not guaranteed.
//!
//! - **Packets** (`types.rs`): data and acknowledgement packets with a
//!   planned route and an append-only traveled path
//! - **Topology** (`topology.rs`): the static link graph and per-node path
//!   enumeration
//! - **Routing** (`routing.rs`): route selection and per-tick avoidance memory
//! - **Node** (`node.rs`): buffering, send/receive and per-tick processing
//! - **Mesh** (`mesh.rs`): the tick scheduler, random failures and metrics
//! - **Scenarios** (`scenarios.rs`): built-in meshes and the throughput run
//!
//! ## Example
//!
//! ```rust
//! use meshroute_simulation::{Mesh, NodeId, SimConfig};
//!
//! let mut mesh = Mesh::from_json(
//!     r#"{"0":["1","2"],"1":["0","2"],"2":["0","1"]}"#,
//!     SimConfig::default().with_seed(7),
//! )?;
//! mesh.generate_topology();
//!
//! mesh.generate_packet(&NodeId::from("0"), &NodeId::from("2"), None)?;
//! mesh.run_ticks(5);
//!
//! assert_eq!(mesh.metrics().hops, vec![1]);
//! assert_eq!(mesh.metrics().round_trips, 1);
//! # Ok::<(), meshroute_simulation::SimError>(())
//! ```
//!
//! ## Ticks
//!
//! A tick gives every node, in id order, one chance to move the head of its
//! buffer. A packet is never processed in the tick it arrives. A node that
//! already ran this tick keeps the deferral until its next turn, so a packet
//! handed to a lower id waits one tick longer than one handed to a higher
//! id. The tick counter only advances after a tick in which something
//! happened.

pub mod config;
pub mod error;
pub mod events;
pub mod mesh;
pub mod metrics;
pub mod node;
pub mod routing;
pub mod scenarios;
pub mod topology;
pub mod types;

pub use config::{FailureKind, SimConfig};
pub use error::{SimError, SimResult};
pub use events::{EventKind, EventLog, EventScope, EventSink, MeshEvent};
pub use mesh::{EMPTY_BUFFERS, Mesh};
pub use metrics::{MeshMetrics, MetricsReport};
pub use node::{Fabric, Node, NodeOutcome};
pub use routing::{Avoid, AvoidanceMemory, select_route};
pub use scenarios::{BuiltinMesh, ThroughputOutcome, ThroughputRun};
pub use topology::{PathSet, TopologySpec};
pub use types::{LinkKey, NodeId, Packet, PacketKind, Path};
