//! Typed topology and cluster-descriptor documents
//!
//! These mirror the JSON bodies accepted over HTTP (see `ncp-server`), but are
//! parsed into explicit structs rather than free-form JSON values -- unknown
//! fields are rejected so a typo'd document fails at the boundary instead of
//! silently compiling into something unintended.

use serde::{Deserialize, Serialize};

/// Top-level SNN topology document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyDoc {
    /// Human-readable network name
    pub network_name: String,
    /// Total neuron count, must equal the union of all layer spans
    pub neuron_count: u32,
    /// Layer definitions
    pub layers: Vec<LayerDef>,
    /// Connection definitions
    #[serde(default)]
    pub connections: Vec<ConnectionDef>,
    /// Node assignment strategy
    pub node_assignment: NodeAssignmentDef,
}

/// One layer of neurons
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerDef {
    /// Layer id, referenced by connections
    pub layer_id: u32,
    /// Layer kind
    pub layer_type: LayerType,
    /// Inclusive `[start, end]` global neuron id span
    pub neuron_ids: (u32, u32),
    /// Fire threshold override
    #[serde(default)]
    pub threshold: Option<f32>,
    /// Leak rate override, in `[0, 1]`
    #[serde(default)]
    pub leak_rate: Option<f32>,
    /// Refractory period override, in microseconds
    #[serde(default)]
    pub refractory_period_us: Option<u32>,
}

/// Layer role, driving the ACTIVE/INPUT/OUTPUT flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// Receives external spike injection
    Input,
    /// Ordinary interior layer
    Hidden,
    /// Carries the OUTPUT flag bit, otherwise ordinary
    Output,
}

/// Synaptic weight initialization strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "weight_init", rename_all = "snake_case")]
pub enum WeightInit {
    /// Normally distributed around `mean` with `stddev`
    RandomNormal {
        /// Mean weight
        weight_mean: f32,
        /// Standard deviation
        weight_stddev: f32,
    },
    /// Uniformly distributed in `[min, max]`
    RandomUniform {
        /// Lower bound
        weight_min: f32,
        /// Upper bound
        weight_max: f32,
    },
    /// A fixed weight for every synapse
    Constant {
        /// The constant weight
        weight: f32,
    },
}

/// One connection-generation rule
///
/// Not `deny_unknown_fields`: `weight_init` is `#[serde(flatten)]`, and serde
/// does not support combining `flatten` with `deny_unknown_fields` on the
/// same struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDef {
    /// Source layer, for layer-to-layer connection kinds
    #[serde(default)]
    pub source_layer: Option<u32>,
    /// Target layer, for layer-to-layer connection kinds
    #[serde(default)]
    pub target_layer: Option<u32>,
    /// Source neuron, for an explicit single connection
    #[serde(default)]
    pub source_neuron: Option<u32>,
    /// Target neuron, for an explicit single connection
    #[serde(default)]
    pub target_neuron: Option<u32>,
    /// Single fixed weight, used by `explicit` connections
    #[serde(default)]
    pub weight: Option<f32>,
    /// Connection synthesis kind
    pub connection_type: ConnectionType,
    /// Weight distribution, for synthesized connection kinds
    #[serde(flatten, default)]
    pub weight_init: Option<WeightInit>,
    /// Inclusive weight range, used by `sparse_random`/`random` when
    /// `weight_init` is absent
    #[serde(default)]
    pub weight_range: Option<(f32, f32)>,
    /// Per-pair connection probability (alias: `probability`)
    #[serde(default, alias = "probability")]
    pub connection_probability: Option<f32>,
}

/// How a [`ConnectionDef`] expands into individual synapses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Every (source, target) pair in the two layers
    FullyConnected,
    /// Each pair independently included with `connection_probability`
    SparseRandom,
    /// Alias of `sparse_random`
    Random,
    /// A single explicit (source_neuron, target_neuron, weight) synapse
    Explicit,
}

/// Node assignment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeAssignmentDef {
    /// Partitioning strategy
    pub strategy: AssignmentStrategy,
    /// Explicit node id list to assign across, if not using the cluster descriptor
    #[serde(default)]
    pub nodes: Option<Vec<u32>>,
    /// Target backplane name
    #[serde(default)]
    pub backplane: Option<String>,
    /// Deterministic RNG seed used for weight synthesis
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Neuron-to-node partitioning strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    /// Floor-divide evenly, round-robin the remainder
    Balanced,
    /// One layer per node, round-robin across nodes
    LayerBased,
}

/// Describes the physical cluster available for deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterDescriptor {
    /// Backplanes available for deployment
    pub backplanes: Vec<BackplaneDescriptor>,
}

/// One backplane's node count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackplaneDescriptor {
    /// Backplane name, referenced by [`NodeAssignmentDef::backplane`]
    pub name: String,
    /// Number of nodes on this backplane, at most 16
    pub node_count: u32,
}
