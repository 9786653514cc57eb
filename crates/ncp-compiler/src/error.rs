//! Error types for the topology compiler

use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors that can occur while compiling a topology into a deployment plan
#[derive(Error, Debug)]
pub enum CompileError {
    /// A connection referenced a layer id that does not exist
    #[error("connection references unknown layer {layer_id}")]
    UnknownLayer {
        /// The missing layer id
        layer_id: u32,
    },

    /// A connection referenced a neuron id outside `[0, neuron_count)`
    #[error("connection references unknown neuron {neuron_id}")]
    UnknownNeuron {
        /// The missing neuron id
        neuron_id: u32,
    },

    /// Layer neuron-id spans overlap or do not cover `[0, neuron_count)`
    #[error("layer spans are not contiguous and disjoint: {reason}")]
    NonContiguousLayers {
        /// Explanation of the gap or overlap found
        reason: String,
    },

    /// A neuron ended up unmapped to any physical node
    #[error("neuron {global_id} was not assigned to any node")]
    UnmappedNeuron {
        /// The unmapped global neuron id
        global_id: u32,
    },

    /// A synapse's source neuron does not resolve in the neuron map
    #[error("synapse source {source_id} does not resolve to any compiled neuron")]
    UnresolvedSynapseSource {
        /// The unresolved source id
        source_id: u32,
    },

    /// The cluster descriptor has no available nodes
    #[error("no nodes available to assign neurons to")]
    NoAvailableNodes,

    /// A backplane descriptor requested more nodes than the hardware limit
    #[error("backplane '{name}' requests {requested} nodes, limit is {limit}")]
    TooManyNodes {
        /// Offending backplane name
        name: String,
        /// Requested node count
        requested: u32,
        /// Hardware limit
        limit: u32,
    },

    /// Failed to encode a compiled neuron into its wire form
    #[error("layout error while encoding neuron {global_id}: {source}")]
    Layout {
        /// Offending global neuron id
        global_id: u32,
        /// Underlying layout error
        #[source]
        source: ncp_layout::LayoutError,
    },

    /// The input topology document failed to parse
    #[error("invalid topology document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

impl CompileError {
    /// Build an [`CompileError::NonContiguousLayers`]
    pub fn non_contiguous(reason: impl Into<String>) -> Self {
        Self::NonContiguousLayers {
            reason: reason.into(),
        }
    }
}
