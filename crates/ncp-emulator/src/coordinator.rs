//! Routes spikes between every registered engine in the cluster

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use ncp_layout::SpikePacket;

use crate::cluster::join_with_timeout;
use crate::engine::SnnEngine;

const ROUTING_PERIOD: Duration = Duration::from_millis(1);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);
/// Capacity of the recent-spike observability ring
pub const RECENT_SPIKE_CAPACITY: usize = 10_000;

/// Aggregate activity across every registered engine
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalActivity {
    /// Number of registered engines
    pub total_engines: usize,
    /// Sum of neurons across all engines
    pub total_neurons: usize,
    /// Sum of spikes sent across all engines
    pub total_spikes_sent: u64,
    /// Sum of spikes received across all engines
    pub total_spikes_received: u64,
    /// Whether the routing loop is currently active
    pub routing_active: bool,
}

/// Coordinates spike routing across every node's SNN engine in the cluster.
///
/// Routing is a deliberate broadcast: every outgoing spike is pushed to every
/// registered engine's incoming queue, and each engine filters by its own
/// synapse table. This trades CPU for not needing a global neuron-to-engine
/// index; an implementer may cache that index internally as an optimization
/// without changing observable behavior.
pub struct ClusterSnnCoordinator {
    engines: Mutex<HashMap<(u8, u8), Arc<SnnEngine>>>,
    recent_spikes: Mutex<Vec<SpikePacket>>,
    routing_active: Arc<AtomicBool>,
    routing_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ClusterSnnCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterSnnCoordinator {
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
            recent_spikes: Mutex::new(Vec::new()),
            routing_active: Arc::new(AtomicBool::new(false)),
            routing_thread: Mutex::new(None),
        }
    }

    /// Register (or replace) the engine for `(backplane_id, node_id)`,
    /// installing this coordinator's routing as its spike callback.
    pub fn register_engine(self: &Arc<Self>, backplane_id: u8, node_id: u8, engine: Arc<SnnEngine>) {
        let coordinator = Arc::clone(self);
        engine.set_spike_callback(Arc::new(move |spike| coordinator.route_spike(spike)));
        self.engines
            .lock()
            .unwrap()
            .insert((backplane_id, node_id), engine);
    }

    /// Whether an engine is registered for `(backplane_id, node_id)`
    pub fn has_engine(&self, backplane_id: u8, node_id: u8) -> bool {
        self.engines.lock().unwrap().contains_key(&(backplane_id, node_id))
    }

    /// Start every registered engine and the routing loop
    pub fn start_all(self: &Arc<Self>, timestep_us: u64) {
        for engine in self.engines.lock().unwrap().values() {
            engine.start(timestep_us);
        }
        if self.routing_active.swap(true, Ordering::SeqCst) {
            return;
        }
        let coordinator = Arc::clone(self);
        let active = Arc::clone(&self.routing_active);
        let handle = std::thread::spawn(move || {
            while active.load(Ordering::SeqCst) {
                coordinator.drain_and_route_once();
                std::thread::sleep(ROUTING_PERIOD);
            }
        });
        *self.routing_thread.lock().unwrap() = Some(handle);
    }

    /// Stop the routing loop first, then every registered engine -- matching
    /// the order that avoids routing into engines mid-shutdown.
    pub fn stop_all(&self) {
        if self.routing_active.swap(false, Ordering::SeqCst) {
            if let Some(handle) = self.routing_thread.lock().unwrap().take() {
                join_with_timeout(handle, "spike routing thread", SHUTDOWN_TIMEOUT);
            }
        }
        for engine in self.engines.lock().unwrap().values() {
            engine.stop();
        }
    }

    /// Inject a spike directly into `(backplane_id, node_id)`'s neuron
    /// `neuron_id`, bypassing the first-match ambiguity of [`Self::inject_spike`].
    pub fn inject_spike_at(&self, backplane_id: u8, node_id: u8, neuron_id: u16, value: f32) {
        if let Some(engine) = self.engines.lock().unwrap().get(&(backplane_id, node_id)) {
            engine.inject_spike(neuron_id, value);
        }
    }

    /// Inject a spike into the first registered engine whose neuron table
    /// contains `neuron_id`. Matches the documented `/api/snn/input`
    /// behavior: with duplicate local ids across nodes, only one receives it.
    pub fn inject_spike(&self, neuron_id: u16, value: f32) -> bool {
        for engine in self.engines.lock().unwrap().values() {
            if engine.has_neuron(neuron_id) {
                return engine.inject_spike(neuron_id, value);
            }
        }
        false
    }

    fn route_spike(&self, spike: SpikePacket) {
        {
            let mut recent = self.recent_spikes.lock().unwrap();
            if recent.len() >= RECENT_SPIKE_CAPACITY {
                recent.remove(0);
            }
            recent.push(spike);
        }
        for engine in self.engines.lock().unwrap().values() {
            engine.deliver(spike);
        }
    }

    fn drain_and_route_once(&self) {
        let engines: Vec<Arc<SnnEngine>> = self.engines.lock().unwrap().values().cloned().collect();
        for engine in engines {
            for spike in engine.drain_outgoing() {
                self.route_spike(spike);
            }
        }
    }

    /// Aggregate activity across every registered engine
    pub fn global_activity(&self) -> GlobalActivity {
        let engines = self.engines.lock().unwrap();
        let (sent, received) = engines.values().map(|e| e.spike_counters()).fold(
            (0u64, 0u64),
            |(sent, received), (s, r)| (sent + s, received + r),
        );
        GlobalActivity {
            total_engines: engines.len(),
            total_neurons: engines.values().map(|e| e.neuron_count()).sum(),
            total_spikes_sent: sent,
            total_spikes_received: received,
            routing_active: self.routing_active.load(Ordering::SeqCst),
        }
    }

    /// The most recent `count` spikes observed by the router, oldest first
    pub fn recent_spikes(&self, count: usize) -> Vec<SpikePacket> {
        let recent = self.recent_spikes.lock().unwrap();
        let start = recent.len().saturating_sub(count);
        recent[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncp_layout::neuron_entry::{NeuronEntry, SynapseWord};
    use ncp_layout::NeuronFlags;

    fn input_entry(local_id: u16) -> NeuronEntry {
        NeuronEntry {
            local_id,
            flags: NeuronFlags::ACTIVE,
            membrane_potential: 0.0,
            threshold: 1.0,
            last_spike_time_us: 0,
            leak_rate: 0.95,
            refractory_period_us: 1000,
            synapses: vec![],
        }
    }

    #[test]
    fn recent_spike_ring_drops_oldest_past_capacity() {
        let coordinator = Arc::new(ClusterSnnCoordinator::new());
        for i in 0..5 {
            coordinator.route_spike(SpikePacket {
                source_backplane: 0,
                source_node: 0,
                neuron_id: i,
                timestamp_us: 0,
                value: 1.0,
            });
        }
        let recent = coordinator.recent_spikes(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent.last().unwrap().neuron_id, 4);
    }

    #[test]
    fn broadcast_routing_delivers_to_every_engine() {
        let coordinator = Arc::new(ClusterSnnCoordinator::new());
        let engine_a = Arc::new(SnnEngine::new(0, 0));
        let engine_b = Arc::new(SnnEngine::new(0, 1));
        let source = ncp_layout::GlobalNeuronId::encode(ncp_layout::NodeId::new(0), 0).raw();
        engine_b.load_from_parsed(&[NeuronEntry {
            synapses: vec![SynapseWord { source_encoded: source, weight: 255 }],
            ..input_entry(0)
        }]);
        coordinator.register_engine(0, 0, engine_a.clone());
        coordinator.register_engine(0, 1, engine_b.clone());

        coordinator.route_spike(SpikePacket {
            source_backplane: 0,
            source_node: 0,
            neuron_id: 0,
            timestamp_us: 0,
            value: 1.0,
        });
        engine_b.tick(1000);
        assert_eq!(engine_b.drain_outgoing().len(), 1);
    }

    #[test]
    fn global_activity_reports_registered_engine_count() {
        let coordinator = Arc::new(ClusterSnnCoordinator::new());
        coordinator.register_engine(0, 0, Arc::new(SnnEngine::new(0, 0)));
        assert_eq!(coordinator.global_activity().total_engines, 1);
    }
}
