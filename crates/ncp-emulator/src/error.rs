//! Error types for the cluster emulator

use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors that can occur while driving the emulated cluster
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// A memory access fell outside both the flash and PSRAM regions
    #[error("invalid memory address {addr:#010x}")]
    InvalidAddress {
        /// The offending address
        addr: u32,
    },

    /// A memory access extended past the end of its region
    #[error("{region} access out of bounds: addr {addr:#010x}, length {length}")]
    OutOfBounds {
        /// Region name ("flash" or "psram")
        region: &'static str,
        /// Starting address
        addr: u32,
        /// Requested length
        length: usize,
    },

    /// A firmware blob was too short to contain a header
    #[error("firmware blob too short: need at least {need} bytes, got {got}")]
    FirmwareTooShort {
        /// Bytes required
        need: usize,
        /// Bytes available
        got: usize,
    },

    /// Underlying wire-layout decode/encode failure
    #[error(transparent)]
    Layout(#[from] ncp_layout::LayoutError),

    /// Referenced a node id that does not exist on its backplane
    #[error("node {node_id} not found on backplane '{backplane}'")]
    NodeNotFound {
        /// Backplane name
        backplane: String,
        /// Missing node id
        node_id: u8,
    },

    /// Referenced a backplane name that does not exist
    #[error("backplane '{name}' not found")]
    BackplaneNotFound {
        /// Missing backplane name
        name: String,
    },

    /// Joining a worker thread did not complete within the shutdown timeout
    #[error("{what} did not stop within {timeout_ms}ms")]
    ShutdownTimeout {
        /// Description of what failed to stop
        what: &'static str,
        /// Timeout that was exceeded
        timeout_ms: u64,
    },
}

impl EmulatorError {
    /// Build an [`EmulatorError::OutOfBounds`]
    pub fn out_of_bounds(region: &'static str, addr: u32, length: usize) -> Self {
        Self::OutOfBounds { region, addr, length }
    }
}
