//! The compiler's output: per-node byte blobs plus a global neuron map

use ncp_layout::NodeId;
use std::collections::HashMap;

/// Physical location of a compiled neuron
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalNeuron {
    /// Backplane name the neuron lives on
    pub backplane: String,
    /// Node id within that backplane
    pub node: NodeId,
    /// Local id within that node's table
    pub local_id: u16,
}

/// Result of compiling a topology: one byte blob per `(backplane, node)`, a
/// global-id to physical-location map, and summary totals.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// Encoded neuron table bytes, keyed by `(backplane_name, node_id)`
    pub tables: HashMap<(String, u8), Vec<u8>>,
    /// Global neuron id to physical location
    pub neuron_map: HashMap<u32, PhysicalNeuron>,
    /// Node ids used per backplane, in assignment order
    pub backplane_nodes: HashMap<String, Vec<u8>>,
    /// Total neurons compiled
    pub neuron_count: usize,
    /// Total synapses compiled (after capacity truncation)
    pub synapse_count: usize,
}

impl DeploymentPlan {
    /// Convenience accessor for a single node's table bytes
    pub fn table_for(&self, backplane: &str, node: u8) -> Option<&[u8]> {
        self.tables
            .get(&(backplane.to_string(), node))
            .map(|v| v.as_slice())
    }
}
