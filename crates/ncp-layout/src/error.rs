//! Error types for the binary layout layer

use thiserror::Error;

/// Result type for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors that can occur while encoding or decoding the wire layout
#[derive(Error, Debug)]
pub enum LayoutError {
    /// Buffer too short to hold a complete record
    #[error("buffer too short: need {need} bytes, got {got}")]
    ShortBuffer {
        /// Bytes required
        need: usize,
        /// Bytes available
        got: usize,
    },

    /// Firmware header magic did not match
    #[error("invalid firmware magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic {
        /// Expected magic value
        expected: u32,
        /// Found magic value
        found: u32,
    },

    /// A neuron carries more synapses than the table format allows
    #[error("synapse count {count} exceeds capacity {capacity}")]
    SynapseOverflow {
        /// Requested synapse count
        count: usize,
        /// Maximum synapses per neuron entry
        capacity: usize,
    },

    /// A string field did not fit the fixed-width wire slot
    #[error("field '{field}' exceeds {limit} bytes once encoded")]
    FieldTooLong {
        /// Name of the offending field
        field: &'static str,
        /// Maximum encoded length
        limit: usize,
    },
}

impl LayoutError {
    /// Build a [`LayoutError::ShortBuffer`]
    pub fn short_buffer(need: usize, got: usize) -> Self {
        Self::ShortBuffer { need, got }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffer_display() {
        let err = LayoutError::short_buffer(256, 10);
        assert!(format!("{err}").contains("need 256"));
    }
}
