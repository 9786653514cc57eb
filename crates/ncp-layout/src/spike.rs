//! Logical spike packet shared between engines and the coordinator

/// A single spike event, addressed by its source neuron's physical location
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpikePacket {
    /// Backplane the spiking neuron lives on
    pub source_backplane: u8,
    /// Node the spiking neuron lives on
    pub source_node: u8,
    /// Local neuron id that fired
    pub neuron_id: u16,
    /// Simulation time of the spike, in microseconds
    pub timestamp_us: u32,
    /// Spike amplitude (always `1.0` for a standard fire, but left open for
    /// injected spikes with a custom value)
    pub value: f32,
}

impl SpikePacket {
    /// The 32-bit global id of the neuron that produced this spike:
    /// `(backplane << 24) | (node << 16) | local_id`.
    pub fn source_global_id(&self) -> u32 {
        ((self.source_backplane as u32) << 24)
            | ((self.source_node as u32) << 16)
            | self.neuron_id as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_id_packs_fields_in_order() {
        let spike = SpikePacket {
            source_backplane: 1,
            source_node: 2,
            neuron_id: 3,
            timestamp_us: 0,
            value: 1.0,
        };
        assert_eq!(spike.source_global_id(), (1 << 24) | (2 << 16) | 3);
    }
}
