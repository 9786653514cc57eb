//! Binary wire layout shared by the topology compiler and the cluster emulator.
//!
//! This crate is deliberately pure and stateless: it only encodes and decodes
//! bytes. It knows nothing about nodes, buses, or simulation -- those live in
//! `ncp-emulator` and `ncp-compiler`, both of which depend on this crate for
//! the wire contract.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod firmware;
pub mod ids;
pub mod neuron_entry;
pub mod spike;
pub mod weight;

pub use error::{LayoutError, Result};
pub use firmware::FirmwareHeader;
pub use ids::{GlobalNeuronId, NodeId};
pub use neuron_entry::{NeuronEntry, NeuronFlags, SynapseWord, ENTRY_SIZE, MAX_SYNAPSES};
pub use spike::SpikePacket;

/// Base address of the flash memory region
pub const FLASH_BASE: u32 = 0x1000_0000;
/// Base address of the PSRAM region
pub const PSRAM_BASE: u32 = 0x2000_0000;
/// Offset within PSRAM at which the neuron table is expected to live
pub const NEURON_TABLE_OFFSET: u32 = 0x0010_0000;
/// Absolute address of the neuron table
pub const NEURON_TABLE_ADDR: u32 = PSRAM_BASE + NEURON_TABLE_OFFSET;

/// Flash region size (2 MiB)
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
/// PSRAM region size (8 MiB)
pub const PSRAM_SIZE: usize = 8 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neuron_table_addr_is_psram_plus_offset() {
        assert_eq!(NEURON_TABLE_ADDR, 0x2010_0000);
    }
}
