//! The 256-byte per-neuron wire entry and the neuron table it forms

use crate::error::{LayoutError, Result};

/// Size in bytes of a single neuron entry (and the end-of-table marker)
pub const ENTRY_SIZE: usize = 256;

/// Sentinel local id written to the end-of-table marker entry
pub const END_MARKER: u16 = 0xFFFF;

/// Maximum synapses a single neuron entry can carry
pub const MAX_SYNAPSES: usize = 60;

const OFFSET_NEURON_ID: usize = 0;
const OFFSET_FLAGS: usize = 2;
const OFFSET_MEMBRANE: usize = 4;
const OFFSET_THRESHOLD: usize = 8;
const OFFSET_LAST_SPIKE: usize = 12;
const OFFSET_SYNAPSE_COUNT: usize = 16;
const OFFSET_SYNAPSE_CAPACITY: usize = 18;
const OFFSET_LEAK_RATE: usize = 24;
const OFFSET_REFRACTORY: usize = 28;
const OFFSET_SYNAPSES: usize = 40;
const SYNAPSE_WORD_SIZE: usize = 4;

// A tiny bitflags-like macro, matching the scale of flag sets used in this
// crate without pulling in the `bitflags` crate for three bits.
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($ty);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            /// Empty flag set
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Raw bit pattern
            pub const fn bits(self) -> $ty {
                self.0
            }

            /// Build from raw bits, ignoring unknown bits
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self(bits)
            }

            /// Whether all bits of `other` are set
            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

bitflags_lite! {
    /// Per-neuron behavior flags, stored in the entry's flags word
    pub struct NeuronFlags: u16 {
        const ACTIVE = 1 << 0;
        const INPUT  = 1 << 2;
        const OUTPUT = 1 << 3;
    }
}

/// A single synapse as stored inline in a neuron entry: a 24-bit intra-backplane
/// source id and its quantized weight byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynapseWord {
    /// `(node_id << 16) | local_id` of the presynaptic neuron
    pub source_encoded: u32,
    /// Quantized weight byte
    pub weight: u8,
}

impl SynapseWord {
    fn to_u32(self) -> u32 {
        (self.source_encoded << 8) | self.weight as u32
    }

    fn from_u32(word: u32) -> Self {
        Self {
            source_encoded: (word >> 8) & 0x00FF_FFFF,
            weight: (word & 0xFF) as u8,
        }
    }
}

/// One neuron's full on-wire state: identity, LIF parameters, and its inbound
/// synapse list (up to [`MAX_SYNAPSES`]).
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronEntry {
    /// Local id on the owning node
    pub local_id: u16,
    /// Behavior flags
    pub flags: NeuronFlags,
    /// Initial membrane potential
    pub membrane_potential: f32,
    /// Fire threshold
    pub threshold: f32,
    /// Last spike time in microseconds (0 at compile time)
    pub last_spike_time_us: u32,
    /// Leak multiplier applied per tick, in `[0, 1]`
    pub leak_rate: f32,
    /// Refractory window in microseconds
    pub refractory_period_us: u32,
    /// Inbound synapses, at most [`MAX_SYNAPSES`]
    pub synapses: Vec<SynapseWord>,
}

impl NeuronEntry {
    /// Encode this entry into a fixed 256-byte buffer
    pub fn encode(&self) -> Result<[u8; ENTRY_SIZE]> {
        if self.synapses.len() > MAX_SYNAPSES {
            return Err(LayoutError::SynapseOverflow {
                count: self.synapses.len(),
                capacity: MAX_SYNAPSES,
            });
        }

        let mut buf = [0u8; ENTRY_SIZE];
        buf[OFFSET_NEURON_ID..OFFSET_NEURON_ID + 2].copy_from_slice(&self.local_id.to_le_bytes());
        buf[OFFSET_FLAGS..OFFSET_FLAGS + 2].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[OFFSET_MEMBRANE..OFFSET_MEMBRANE + 4]
            .copy_from_slice(&self.membrane_potential.to_le_bytes());
        buf[OFFSET_THRESHOLD..OFFSET_THRESHOLD + 4].copy_from_slice(&self.threshold.to_le_bytes());
        buf[OFFSET_LAST_SPIKE..OFFSET_LAST_SPIKE + 4]
            .copy_from_slice(&self.last_spike_time_us.to_le_bytes());
        buf[OFFSET_SYNAPSE_COUNT..OFFSET_SYNAPSE_COUNT + 2]
            .copy_from_slice(&(self.synapses.len() as u16).to_le_bytes());
        buf[OFFSET_SYNAPSE_CAPACITY..OFFSET_SYNAPSE_CAPACITY + 2]
            .copy_from_slice(&(MAX_SYNAPSES as u16).to_le_bytes());
        buf[OFFSET_LEAK_RATE..OFFSET_LEAK_RATE + 4].copy_from_slice(&self.leak_rate.to_le_bytes());
        buf[OFFSET_REFRACTORY..OFFSET_REFRACTORY + 4]
            .copy_from_slice(&self.refractory_period_us.to_le_bytes());

        for (i, syn) in self.synapses.iter().enumerate() {
            let offset = OFFSET_SYNAPSES + i * SYNAPSE_WORD_SIZE;
            buf[offset..offset + SYNAPSE_WORD_SIZE].copy_from_slice(&syn.to_u32().to_le_bytes());
        }

        Ok(buf)
    }

    /// Decode a single entry from a 256-byte slice
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < ENTRY_SIZE {
            return Err(LayoutError::short_buffer(ENTRY_SIZE, data.len()));
        }

        let local_id = u16::from_le_bytes(data[0..2].try_into().unwrap());
        let flags = NeuronFlags::from_bits_truncate(u16::from_le_bytes(
            data[OFFSET_FLAGS..OFFSET_FLAGS + 2].try_into().unwrap(),
        ));
        let membrane_potential = f32::from_le_bytes(
            data[OFFSET_MEMBRANE..OFFSET_MEMBRANE + 4].try_into().unwrap(),
        );
        let threshold =
            f32::from_le_bytes(data[OFFSET_THRESHOLD..OFFSET_THRESHOLD + 4].try_into().unwrap());
        let last_spike_time_us = u32::from_le_bytes(
            data[OFFSET_LAST_SPIKE..OFFSET_LAST_SPIKE + 4].try_into().unwrap(),
        );
        let synapse_count = u16::from_le_bytes(
            data[OFFSET_SYNAPSE_COUNT..OFFSET_SYNAPSE_COUNT + 2]
                .try_into()
                .unwrap(),
        ) as usize;
        let leak_rate =
            f32::from_le_bytes(data[OFFSET_LEAK_RATE..OFFSET_LEAK_RATE + 4].try_into().unwrap());
        let refractory_period_us = u32::from_le_bytes(
            data[OFFSET_REFRACTORY..OFFSET_REFRACTORY + 4].try_into().unwrap(),
        );

        let mut synapses = Vec::with_capacity(synapse_count.min(MAX_SYNAPSES));
        for i in 0..synapse_count.min(MAX_SYNAPSES) {
            let offset = OFFSET_SYNAPSES + i * SYNAPSE_WORD_SIZE;
            let word = u32::from_le_bytes(
                data[offset..offset + SYNAPSE_WORD_SIZE].try_into().unwrap(),
            );
            synapses.push(SynapseWord::from_u32(word));
        }

        Ok(Self {
            local_id,
            flags,
            membrane_potential,
            threshold,
            last_spike_time_us,
            leak_rate,
            refractory_period_us,
            synapses,
        })
    }
}

/// Encode the end-of-table marker entry: a 256-byte block whose first u16 is
/// [`END_MARKER`].
pub fn encode_end_marker() -> [u8; ENTRY_SIZE] {
    let mut buf = [0u8; ENTRY_SIZE];
    buf[0..2].copy_from_slice(&END_MARKER.to_le_bytes());
    buf
}

/// Encode a full node table: every entry in ascending `local_id` order,
/// followed by one end-marker block.
pub fn encode_table(entries: &[NeuronEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity((entries.len() + 1) * ENTRY_SIZE);
    for entry in entries {
        out.extend_from_slice(&entry.encode()?);
    }
    out.extend_from_slice(&encode_end_marker());
    Ok(out)
}

/// Decode a node table until the end marker or an empty (all-zero) block is
/// reached, with a hard cap of 1024 entries matching the firmware's scan limit.
pub fn decode_table(data: &[u8]) -> Result<Vec<NeuronEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0;
    while offset + ENTRY_SIZE <= data.len() && entries.len() < 1024 {
        let block = &data[offset..offset + ENTRY_SIZE];
        let local_id = u16::from_le_bytes(block[0..2].try_into().unwrap());
        if local_id == END_MARKER {
            break;
        }
        if offset > 0 && block.iter().all(|&b| b == 0) {
            break;
        }
        entries.push(NeuronEntry::decode(block)?);
        offset += ENTRY_SIZE;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_entry() -> NeuronEntry {
        NeuronEntry {
            local_id: 7,
            flags: NeuronFlags::ACTIVE,
            membrane_potential: 0.0,
            threshold: 1.0,
            last_spike_time_us: 0,
            leak_rate: 0.95,
            refractory_period_us: 1000,
            synapses: vec![SynapseWord {
                source_encoded: 0x00_0001,
                weight: 200,
            }],
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let entry = sample_entry();
        let bytes = entry.encode().unwrap();
        assert_eq!(bytes.len(), ENTRY_SIZE);
        let decoded = NeuronEntry::decode(&bytes).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn too_many_synapses_is_rejected() {
        let mut entry = sample_entry();
        entry.synapses = vec![SynapseWord { source_encoded: 0, weight: 0 }; MAX_SYNAPSES + 1];
        assert!(matches!(entry.encode(), Err(LayoutError::SynapseOverflow { .. })));
    }

    #[test]
    fn table_of_zero_neurons_is_one_marker_block() {
        let table = encode_table(&[]).unwrap();
        assert_eq!(table.len(), ENTRY_SIZE);
        assert_eq!(u16::from_le_bytes(table[0..2].try_into().unwrap()), END_MARKER);
    }

    #[test]
    fn decode_table_stops_at_end_marker() {
        let entries = vec![sample_entry()];
        let table = encode_table(&entries).unwrap();
        let decoded = decode_table(&table).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn decode_table_respects_declared_synapse_count_cap() {
        let mut entry = sample_entry();
        entry.synapses = vec![SynapseWord { source_encoded: 1, weight: 1 }; MAX_SYNAPSES];
        let table = encode_table(&[entry]).unwrap();
        let decoded = decode_table(&table).unwrap();
        assert_eq!(decoded[0].synapses.len(), MAX_SYNAPSES);
    }

    fn synapse_word_strategy() -> impl Strategy<Value = SynapseWord> {
        (0u32..=0x00FF_FFFF, any::<u8>())
            .prop_map(|(source_encoded, weight)| SynapseWord { source_encoded, weight })
    }

    proptest! {
        #[test]
        fn encode_decode_round_trips_for_arbitrary_entries(
            local_id in any::<u16>(),
            membrane_potential in -1.0e6f32..1.0e6,
            threshold in -1.0e6f32..1.0e6,
            last_spike_time_us in any::<u32>(),
            leak_rate in 0.0f32..=1.0,
            refractory_period_us in any::<u32>(),
            synapses in prop::collection::vec(synapse_word_strategy(), 0..=MAX_SYNAPSES),
        ) {
            let entry = NeuronEntry {
                local_id,
                flags: NeuronFlags::ACTIVE,
                membrane_potential,
                threshold,
                last_spike_time_us,
                leak_rate,
                refractory_period_us,
                synapses,
            };
            let bytes = entry.encode().unwrap();
            prop_assert_eq!(NeuronEntry::decode(&bytes).unwrap(), entry);
        }
    }
}
