//! The cluster: every backplane, plus the bus-tick simulation thread

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backplane::Backplane;
use crate::error::{EmulatorError, Result};
use crate::node::Node;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a freshly created cluster
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Backplanes to create, as `(name, node_count)`
    pub backplanes: Vec<(String, u8)>,
    /// Bus latency applied to every backplane's messages
    pub bus_latency_us: u64,
    /// Bus-tick period while the simulation thread is running
    pub timestep_us: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            backplanes: vec![("backplane0".to_string(), 16)],
            bus_latency_us: 100,
            timestep_us: 1000,
        }
    }
}

/// The full emulated cluster: all backplanes, plus the bus simulation thread.
pub struct Cluster {
    backplanes: Mutex<HashMap<String, Backplane>>,
    config: ClusterConfig,
    running: Arc<AtomicBool>,
    sim_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Cluster {
    /// Build a cluster from `config`
    pub fn new(config: ClusterConfig) -> Self {
        let mut backplanes = HashMap::new();
        for (name, node_count) in &config.backplanes {
            backplanes.insert(
                name.clone(),
                Backplane::new(name.clone(), *node_count, config.bus_latency_us),
            );
        }
        Self {
            backplanes: Mutex::new(backplanes),
            config,
            running: Arc::new(AtomicBool::new(false)),
            sim_thread: Mutex::new(None),
        }
    }

    /// Cluster configuration as given at construction time
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Apply `f` to a named backplane
    pub fn with_backplane<R>(&self, name: &str, f: impl FnOnce(&Backplane) -> R) -> Result<R> {
        let backplanes = self.backplanes.lock();
        let bp = backplanes
            .get(name)
            .ok_or_else(|| EmulatorError::BackplaneNotFound { name: name.to_string() })?;
        Ok(f(bp))
    }

    /// Apply `f` to a named backplane, mutably
    pub fn with_backplane_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Backplane) -> R,
    ) -> Result<R> {
        let mut backplanes = self.backplanes.lock();
        let bp = backplanes
            .get_mut(name)
            .ok_or_else(|| EmulatorError::BackplaneNotFound { name: name.to_string() })?;
        Ok(f(bp))
    }

    /// Run `f` over every `(backplane_name, node)` pair in the cluster
    pub fn for_each_node(&self, mut f: impl FnMut(&str, &Node)) {
        let backplanes = self.backplanes.lock();
        for (name, bp) in backplanes.iter() {
            for node in bp.nodes() {
                f(name, node);
            }
        }
    }

    /// Names of every backplane in the cluster, in insertion order is not
    /// guaranteed (backing map), but callers typically only need the set.
    pub fn backplane_names(&self) -> Vec<String> {
        self.backplanes.lock().keys().cloned().collect()
    }

    /// Total node count across every backplane
    pub fn total_nodes(&self) -> usize {
        self.backplanes.lock().values().map(|b| b.node_count()).sum()
    }

    /// Start the bus-tick simulation thread. Idempotent: a second call while
    /// already running is a no-op.
    pub fn start_simulation(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let cluster = Arc::clone(self);
        let running = Arc::clone(&self.running);
        let timestep = Duration::from_micros(self.config.timestep_us.max(1));
        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                {
                    let mut backplanes = cluster.backplanes.lock();
                    for bp in backplanes.values_mut() {
                        bp.tick();
                    }
                }
                std::thread::sleep(timestep);
            }
        });
        *self.sim_thread.lock() = Some(handle);
    }

    /// Stop the simulation thread, joining with a 1s timeout. If the join
    /// does not complete in time the handle is dropped and a warning logged
    /// -- shutdown always proceeds.
    pub fn stop_simulation(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.sim_thread.lock().take() {
            join_with_timeout(handle, "cluster simulation thread", SHUTDOWN_TIMEOUT);
        }
    }

    /// Reset every node on every backplane
    pub fn reset_all(&self) {
        let mut backplanes = self.backplanes.lock();
        for bp in backplanes.values_mut() {
            bp.reset_all();
        }
    }
}

/// Join a worker thread, logging (rather than failing) if it overruns the
/// shutdown timeout -- matches the emulator's permissive runtime failure model.
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, what: &'static str, timeout: Duration) {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = handle.join();
        let _ = tx.send(());
    });
    if rx.recv_timeout(timeout).is_err() {
        let err = EmulatorError::ShutdownTimeout { what, timeout_ms: timeout.as_millis() as u64 };
        tracing::warn!(%err, "thread join timed out, detaching");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_one_backplane_of_16() {
        let cluster = Cluster::new(ClusterConfig::default());
        assert_eq!(cluster.total_nodes(), 16);
    }

    #[test]
    fn start_simulation_is_idempotent() {
        let cluster = Arc::new(Cluster::new(ClusterConfig {
            timestep_us: 500,
            ..ClusterConfig::default()
        }));
        cluster.start_simulation();
        cluster.start_simulation();
        cluster.stop_simulation();
    }

    #[test]
    fn reset_all_clears_node_reset_counters_to_one() {
        let cluster = Cluster::new(ClusterConfig::default());
        cluster.reset_all();
        cluster
            .with_backplane("backplane0", |bp| {
                assert_eq!(bp.node(0).unwrap().stats().resets, 1);
            })
            .unwrap();
    }
}
