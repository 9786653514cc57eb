//! A single emulated compute node: status, LED, memory, and statistics

use std::time::Instant;

use ncp_layout::firmware::{FirmwareHeader, HEADER_SIZE};
use ncp_layout::neuron_entry::{decode_table, NeuronEntry};
use ncp_layout::NEURON_TABLE_ADDR;

use crate::error::{EmulatorError, Result};
use crate::memory::{Memory, FIRMWARE_BUFFER_ADDR};

/// Node lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Powered but not yet booted into an application
    Inactive,
    /// Running normally
    Active,
    /// Halted after an unrecoverable fault
    Error,
    /// Running the bootloader, awaiting a firmware image
    Bootloader,
}

impl NodeStatus {
    /// Lowercase name, matching the wire representation used by the HTTP surface
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Error => "error",
            Self::Bootloader => "bootloader",
        }
    }
}

/// RGB status LED state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedState {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

/// Per-node activity counters
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStats {
    /// Bus messages sent from this node
    pub bus_messages_sent: u64,
    /// Bus messages delivered to this node
    pub bus_messages_received: u64,
    /// Memory read operations served
    pub memory_reads: u64,
    /// Memory write operations served
    pub memory_writes: u64,
    /// Number of times this node has been reset
    pub resets: u64,
}

/// One pending bus message queued for this node to observe
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    /// Command byte
    pub command: u8,
    /// Message payload
    pub data: Vec<u8>,
}

/// A single emulated compute node
pub struct Node {
    /// Node id within its backplane (0..=15)
    pub id: u8,
    /// Owning backplane name
    pub backplane: String,
    status: NodeStatus,
    memory: Memory,
    led: LedState,
    firmware_header: Option<FirmwareHeader>,
    boot_time: Instant,
    stats: NodeStats,
    message_queue: Vec<QueuedMessage>,
    parsed_neurons: Vec<NeuronEntry>,
}

impl Node {
    /// Create a new, active node
    pub fn new(id: u8, backplane: impl Into<String>) -> Self {
        Self {
            id,
            backplane: backplane.into(),
            status: NodeStatus::Active,
            memory: Memory::default(),
            led: LedState::default(),
            firmware_header: None,
            boot_time: Instant::now(),
            stats: NodeStats::default(),
            message_queue: Vec::new(),
            parsed_neurons: Vec::new(),
        }
    }

    /// Current lifecycle status
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Current LED state
    pub fn led(&self) -> LedState {
        self.led
    }

    /// Activity counters
    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    /// Parsed neuron table, as last produced by [`Node::parse_neuron_table`]
    pub fn parsed_neurons(&self) -> &[NeuronEntry] {
        &self.parsed_neurons
    }

    /// Uptime since the last reset, in milliseconds
    pub fn uptime_ms(&self) -> u64 {
        self.boot_time.elapsed().as_millis() as u64
    }

    /// Approximate free PSRAM
    pub fn free_memory(&self) -> usize {
        self.memory.free_psram()
    }

    /// Reset to a freshly booted, active state: clears LED, queues, and the
    /// parsed neuron table cache, and bumps the reset counter.
    pub fn reset(&mut self) {
        self.status = NodeStatus::Active;
        self.led = LedState::default();
        self.boot_time = Instant::now();
        self.stats.resets += 1;
        self.message_queue.clear();
        self.parsed_neurons.clear();
    }

    /// Read node memory, incrementing the read counter
    pub fn read_memory(&mut self, addr: u32, length: usize) -> Result<Vec<u8>> {
        self.stats.memory_reads += 1;
        self.memory.read(addr, length)
    }

    /// Write node memory, incrementing the write counter
    pub fn write_memory(&mut self, addr: u32, data: &[u8]) -> Result<usize> {
        self.stats.memory_writes += 1;
        self.memory.write(addr, data)
    }

    /// Parse and cache the header of a firmware blob, then stage the whole
    /// blob into the firmware buffer region. Does not verify the header's
    /// CRC-32 -- see [`ncp_layout::firmware::compute_crc32`] for callers that want to.
    pub fn load_firmware(&mut self, firmware: &[u8]) -> Result<()> {
        if firmware.len() < HEADER_SIZE {
            return Err(EmulatorError::FirmwareTooShort {
                need: HEADER_SIZE,
                got: firmware.len(),
            });
        }
        let header = FirmwareHeader::from_bytes(&firmware[..HEADER_SIZE])?;
        self.memory.write(FIRMWARE_BUFFER_ADDR, firmware)?;
        self.firmware_header = Some(header);
        Ok(())
    }

    /// Currently staged firmware header, if any
    pub fn firmware_header(&self) -> Option<&FirmwareHeader> {
        self.firmware_header.as_ref()
    }

    /// Enqueue a message delivered to this node over the bus
    pub fn receive_message(&mut self, command: u8, data: Vec<u8>) {
        self.message_queue.push(QueuedMessage { command, data });
        self.stats.bus_messages_received += 1;
    }

    /// Record that this node sent a bus message (delivery itself is the
    /// backplane's responsibility)
    pub fn record_message_sent(&mut self) {
        self.stats.bus_messages_sent += 1;
    }

    /// Pending messages queued for this node, oldest first
    pub fn pending_messages(&self) -> &[QueuedMessage] {
        &self.message_queue
    }

    /// Parse the neuron table out of PSRAM at the standard base address and
    /// cache it on the node.
    pub fn parse_neuron_table(&mut self) -> Result<&[NeuronEntry]> {
        let raw = self.memory.read(NEURON_TABLE_ADDR, 1024 * 1024)?;
        self.parsed_neurons = decode_table(&raw)?;
        Ok(&self.parsed_neurons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncp_layout::neuron_entry::{encode_table, NeuronFlags};

    #[test]
    fn fresh_node_is_active_with_zero_stats() {
        let node = Node::new(0, "bp0");
        assert_eq!(node.status(), NodeStatus::Active);
        assert_eq!(node.stats().resets, 0);
    }

    #[test]
    fn reset_clears_queue_and_bumps_counter() {
        let mut node = Node::new(0, "bp0");
        node.receive_message(1, vec![0xAA]);
        node.reset();
        assert!(node.pending_messages().is_empty());
        assert_eq!(node.stats().resets, 1);
    }

    #[test]
    fn parse_neuron_table_round_trips_written_entries() {
        let mut node = Node::new(0, "bp0");
        let entry = NeuronEntry {
            local_id: 0,
            flags: NeuronFlags::ACTIVE,
            membrane_potential: 0.0,
            threshold: 1.0,
            last_spike_time_us: 0,
            leak_rate: 0.95,
            refractory_period_us: 1000,
            synapses: vec![],
        };
        let table = encode_table(&[entry]).unwrap();
        node.write_memory(NEURON_TABLE_ADDR, &table).unwrap();
        let parsed = node.parse_neuron_table().unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn load_firmware_rejects_short_blob() {
        let mut node = Node::new(0, "bp0");
        assert!(matches!(
            node.load_firmware(&[0u8; 10]),
            Err(EmulatorError::FirmwareTooShort { .. })
        ));
    }
}
