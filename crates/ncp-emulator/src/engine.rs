//! Per-node real-time LIF execution engine

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use ncp_layout::neuron_entry::NeuronEntry;
use ncp_layout::weight::dequantize;
use ncp_layout::SpikePacket;

use crate::cluster::join_with_timeout;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// A single LIF neuron's live simulation state
#[derive(Debug, Clone, Copy)]
struct Neuron {
    membrane_potential: f32,
    threshold: f32,
    leak_rate: f32,
    refractory_period_us: u32,
    last_spike_time_us: u32,
}

/// One synapse as loaded into the engine: a presynaptic global id and its
/// dequantized float weight.
#[derive(Debug, Clone, Copy)]
struct Synapse {
    source_global_id: u32,
    weight: f32,
}

#[derive(Debug, Default, Clone, Copy)]
struct EngineStats {
    total_spikes_received: u64,
    total_spikes_sent: u64,
    neurons_spiked: u64,
    simulation_steps: u64,
}

/// Per-node SNN execution engine: owns one node's live neuron/synapse state
/// and ticks it forward in real time.
pub struct SnnEngine {
    node_id: u8,
    backplane_id: u8,
    neurons: Mutex<HashMap<u16, Neuron>>,
    synapses: Mutex<HashMap<u16, Vec<Synapse>>>,
    incoming: Mutex<Vec<SpikePacket>>,
    outgoing: Mutex<Vec<SpikePacket>>,
    current_time_us: AtomicU64,
    stats: Mutex<EngineStats>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    on_spike: Mutex<Option<Arc<dyn Fn(SpikePacket) + Send + Sync>>>,
}

impl SnnEngine {
    /// Create an engine for `(backplane_id, node_id)`, with no neurons loaded.
    pub fn new(backplane_id: u8, node_id: u8) -> Self {
        Self {
            node_id,
            backplane_id,
            neurons: Mutex::new(HashMap::new()),
            synapses: Mutex::new(HashMap::new()),
            incoming: Mutex::new(Vec::new()),
            outgoing: Mutex::new(Vec::new()),
            current_time_us: AtomicU64::new(0),
            stats: Mutex::new(EngineStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            on_spike: Mutex::new(None),
        }
    }

    /// Node id this engine drives
    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Backplane id this engine's node lives on
    pub fn backplane_id(&self) -> u8 {
        self.backplane_id
    }

    /// Number of neurons currently loaded
    pub fn neuron_count(&self) -> usize {
        self.neurons.lock().unwrap().len()
    }

    /// Total synapses currently loaded, across all neurons
    pub fn synapse_count(&self) -> usize {
        self.synapses.lock().unwrap().values().map(Vec::len).sum()
    }

    /// Whether this engine's tick thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Install the callback invoked every time a neuron on this node fires.
    /// Used by the coordinator to route outgoing spikes.
    pub fn set_spike_callback(&self, callback: Arc<dyn Fn(SpikePacket) + Send + Sync>) {
        *self.on_spike.lock().unwrap() = Some(callback);
    }

    /// Replace the engine's neuron/synapse state from a parsed neuron table.
    pub fn load_from_parsed(&self, parsed: &[NeuronEntry]) {
        let mut neurons = self.neurons.lock().unwrap();
        let mut synapses = self.synapses.lock().unwrap();
        neurons.clear();
        synapses.clear();

        for entry in parsed {
            neurons.insert(
                entry.local_id,
                Neuron {
                    membrane_potential: entry.membrane_potential,
                    threshold: entry.threshold,
                    leak_rate: entry.leak_rate,
                    refractory_period_us: entry.refractory_period_us,
                    last_spike_time_us: entry.last_spike_time_us,
                },
            );
            let syns = entry
                .synapses
                .iter()
                .map(|s| Synapse {
                    source_global_id: s.source_encoded,
                    weight: dequantize(s.weight),
                })
                .collect();
            synapses.insert(entry.local_id, syns);
        }
    }

    /// Whether this engine has a neuron loaded under `local_id`
    pub fn has_neuron(&self, local_id: u16) -> bool {
        self.neurons.lock().unwrap().contains_key(&local_id)
    }

    /// Inject an external spike into `local_id`. An input neuron (one with no
    /// inbound synapses) fires unconditionally; any other neuron has `value`
    /// added to its membrane potential and fires only if that crosses
    /// threshold. Returns `false` without effect if this engine has no
    /// neuron under `local_id`.
    pub fn inject_spike(&self, local_id: u16, value: f32) -> bool {
        let has_synapses = self
            .synapses
            .lock()
            .unwrap()
            .get(&local_id)
            .map(|s| !s.is_empty())
            .unwrap_or(false);

        let mut neurons = self.neurons.lock().unwrap();
        let Some(neuron) = neurons.get_mut(&local_id) else {
            return false;
        };
        self.stats.lock().unwrap().total_spikes_received += 1;
        if !has_synapses {
            let now = self.current_time_us.load(Ordering::SeqCst);
            Self::fire(local_id, neuron, now, &self.stats, &self.outgoing, &self.on_spike, self.backplane_id, self.node_id);
        } else {
            neuron.membrane_potential += value;
            if neuron.membrane_potential >= neuron.threshold {
                let now = self.current_time_us.load(Ordering::SeqCst);
                Self::fire(local_id, neuron, now, &self.stats, &self.outgoing, &self.on_spike, self.backplane_id, self.node_id);
            }
        }
        true
    }

    /// Snapshot of this engine's spike counters: `(total_spikes_sent, total_spikes_received)`
    pub fn spike_counters(&self) -> (u64, u64) {
        let stats = self.stats.lock().unwrap();
        (stats.total_spikes_sent, stats.total_spikes_received)
    }

    /// Push a spike into this engine's incoming queue, to be drained on the
    /// next tick
    pub fn deliver(&self, spike: SpikePacket) {
        self.incoming.lock().unwrap().push(spike);
    }

    /// Drain and return every outgoing spike produced since the last drain
    pub fn drain_outgoing(&self) -> Vec<SpikePacket> {
        std::mem::take(&mut self.outgoing.lock().unwrap())
    }

    /// Start the engine's tick thread at the given timestep
    pub fn start(self: &Arc<Self>, timestep_us: u64) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.current_time_us.store(0, Ordering::SeqCst);
        let engine = Arc::clone(self);
        let running = Arc::clone(&self.running);
        let timestep = Duration::from_micros(timestep_us.max(1));
        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                engine.tick(timestep_us);
                std::thread::sleep(timestep);
            }
        });
        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Stop the engine's tick thread, joining with a 1s timeout
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            join_with_timeout(handle, "snn engine tick thread", SHUTDOWN_TIMEOUT);
        }
    }

    /// Run a single simulation step: drain incoming spikes, apply synaptic
    /// input and firing, then leak every neuron's membrane potential.
    pub fn tick(&self, timestep_us: u64) {
        self.stats.lock().unwrap().simulation_steps += 1;
        let now = self.current_time_us.fetch_add(timestep_us, Ordering::SeqCst) + timestep_us;

        let drained: Vec<SpikePacket> = std::mem::take(&mut self.incoming.lock().unwrap());
        for spike in drained {
            self.process_spike(spike, now);
        }

        let mut neurons = self.neurons.lock().unwrap();
        for neuron in neurons.values_mut() {
            if neuron.membrane_potential > 0.0 {
                neuron.membrane_potential *= neuron.leak_rate;
            }
        }
    }

    fn process_spike(&self, spike: SpikePacket, now: u64) {
        let spike_global_id = spike.source_global_id();
        let mut neurons = self.neurons.lock().unwrap();
        let synapses = self.synapses.lock().unwrap();

        for (local_id, syns) in synapses.iter() {
            let Some(neuron) = neurons.get_mut(local_id) else {
                continue;
            };
            if (now as u32).saturating_sub(neuron.last_spike_time_us) < neuron.refractory_period_us {
                continue;
            }
            for syn in syns {
                if syn.source_global_id == spike_global_id {
                    neuron.membrane_potential += syn.weight * spike.value;
                    if neuron.membrane_potential >= neuron.threshold {
                        Self::fire(
                            *local_id,
                            neuron,
                            now,
                            &self.stats,
                            &self.outgoing,
                            &self.on_spike,
                            self.backplane_id,
                            self.node_id,
                        );
                        break;
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fire(
        local_id: u16,
        neuron: &mut Neuron,
        now: u64,
        stats: &Mutex<EngineStats>,
        outgoing: &Mutex<Vec<SpikePacket>>,
        on_spike: &Mutex<Option<Arc<dyn Fn(SpikePacket) + Send + Sync>>>,
        backplane_id: u8,
        node_id: u8,
    ) {
        neuron.membrane_potential = 0.0;
        neuron.last_spike_time_us = now as u32;

        let spike = SpikePacket {
            source_backplane: backplane_id,
            source_node: node_id,
            neuron_id: local_id,
            timestamp_us: now as u32,
            value: 1.0,
        };
        outgoing.lock().unwrap().push(spike);
        {
            let mut stats = stats.lock().unwrap();
            stats.total_spikes_sent += 1;
            stats.neurons_spiked += 1;
        }
        if let Some(cb) = on_spike.lock().unwrap().as_ref() {
            cb(spike);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncp_layout::neuron_entry::SynapseWord;
    use ncp_layout::NeuronFlags;

    fn entry(local_id: u16, synapses: Vec<SynapseWord>) -> NeuronEntry {
        NeuronEntry {
            local_id,
            flags: NeuronFlags::ACTIVE,
            membrane_potential: 0.0,
            threshold: 1.0,
            last_spike_time_us: 0,
            leak_rate: 0.95,
            refractory_period_us: 1000,
            synapses,
        }
    }

    #[test]
    fn input_neuron_with_no_synapses_fires_unconditionally() {
        let engine = SnnEngine::new(0, 0);
        engine.load_from_parsed(&[entry(0, vec![])]);
        engine.inject_spike(0, 1.0);
        let out = engine.drain_outgoing();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].neuron_id, 0);
    }

    #[test]
    fn hidden_neuron_needs_threshold_crossing() {
        let engine = SnnEngine::new(0, 0);
        engine.load_from_parsed(&[entry(
            0,
            vec![SynapseWord { source_encoded: 99, weight: 255 }],
        )]);
        engine.inject_spike(0, 0.5);
        assert!(engine.drain_outgoing().is_empty());
        engine.inject_spike(0, 0.6);
        assert_eq!(engine.drain_outgoing().len(), 1);
    }

    #[test]
    fn process_spike_applies_weighted_input_and_can_fire() {
        let engine = SnnEngine::new(0, 1);
        let source = ncp_layout::GlobalNeuronId::encode(ncp_layout::NodeId::new(0), 5).raw();
        engine.load_from_parsed(&[entry(
            0,
            vec![SynapseWord { source_encoded: source, weight: 255 }],
        )]);
        engine.deliver(SpikePacket {
            source_backplane: 0,
            source_node: 0,
            neuron_id: 5,
            timestamp_us: 0,
            value: 1.0,
        });
        engine.tick(1000);
        let out = engine.drain_outgoing();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn refractory_period_blocks_second_spike() {
        let engine = SnnEngine::new(0, 0);
        let source = ncp_layout::GlobalNeuronId::encode(ncp_layout::NodeId::new(0), 5).raw();
        engine.load_from_parsed(&[NeuronEntry {
            threshold: 0.5,
            refractory_period_us: 10_000,
            ..entry(0, vec![SynapseWord { source_encoded: source, weight: 255 }])
        }]);
        for _ in 0..2 {
            engine.deliver(SpikePacket {
                source_backplane: 0,
                source_node: 0,
                neuron_id: 5,
                timestamp_us: 0,
                value: 1.0,
            });
            engine.tick(1000);
        }
        let out = engine.drain_outgoing();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn leak_reduces_membrane_potential_without_firing() {
        let engine = SnnEngine::new(0, 0);
        engine.load_from_parsed(&[entry(
            0,
            vec![SynapseWord { source_encoded: 99, weight: 100 }],
        )]);
        engine.inject_spike(0, 0.3);
        engine.tick(1000);
        assert!(engine.drain_outgoing().is_empty());
    }
}
