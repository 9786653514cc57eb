//! Software emulation of a neuromorphic compute cluster: per-node memory and
//! lifecycle, inter-node bus messaging, and the real-time LIF execution
//! engine that actually runs a compiled topology.
#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backplane;
pub mod cluster;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod memory;
pub mod node;

pub use backplane::{Backplane, BROADCAST_TARGET};
pub use cluster::{Cluster, ClusterConfig};
pub use coordinator::{ClusterSnnCoordinator, GlobalActivity, RECENT_SPIKE_CAPACITY};
pub use engine::SnnEngine;
pub use error::{EmulatorError, Result};
pub use memory::Memory;
pub use node::{LedState, Node, NodeStats, NodeStatus, QueuedMessage};
