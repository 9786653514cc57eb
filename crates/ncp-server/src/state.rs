//! Shared application state threaded through every HTTP handler

use std::sync::Mutex;

use ncp_compiler::{DeploymentPlan, TopologyDoc};
use ncp_emulator::{Cluster, ClusterSnnCoordinator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ServerError, ServerResult};

/// The subset of runtime configuration an operator may inspect and tweak
/// through `/api/emulator/config`, separate from host/port which are fixed
/// at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Bus latency applied to every backplane, in microseconds
    pub bus_latency_us: u64,
    /// Default SNN engine timestep, in microseconds
    pub timestep_us: u64,
}

/// Partial update body for `POST /api/emulator/config`
#[derive(Debug, Deserialize)]
pub struct SimulationConfigUpdate {
    /// New bus latency, if given
    pub bus_latency_us: Option<u64>,
    /// New default timestep, if given
    pub timestep_us: Option<u64>,
}

/// Everything a handler needs: the emulated cluster, the spike coordinator,
/// the last deployed topology/plan, and the mutable simulation config.
pub struct AppState {
    /// The emulated cluster
    pub cluster: Arc<Cluster>,
    /// The cluster-wide spike router
    pub coordinator: Arc<ClusterSnnCoordinator>,
    deployment: Mutex<Option<Deployment>>,
    sim_config: Mutex<SimulationConfig>,
}

struct Deployment {
    topology: TopologyDoc,
    plan: DeploymentPlan,
}

impl AppState {
    /// Build fresh state around an already-constructed cluster and coordinator
    pub fn new(cluster: Arc<Cluster>, coordinator: Arc<ClusterSnnCoordinator>, sim_config: SimulationConfig) -> Self {
        Self {
            cluster,
            coordinator,
            deployment: Mutex::new(None),
            sim_config: Mutex::new(sim_config),
        }
    }

    /// Record a freshly compiled topology + plan as the active deployment
    pub fn set_deployment(&self, topology: TopologyDoc, plan: DeploymentPlan) {
        *self.deployment.lock().unwrap() = Some(Deployment { topology, plan });
    }

    /// The currently deployed topology document, if any
    pub fn topology(&self) -> ServerResult<TopologyDoc> {
        self.deployment
            .lock()
            .unwrap()
            .as_ref()
            .map(|d| d.topology.clone())
            .ok_or(ServerError::NoTopologyDeployed)
    }

    /// Apply `f` to the currently deployed plan
    pub fn with_plan<R>(&self, f: impl FnOnce(&DeploymentPlan) -> R) -> ServerResult<R> {
        let guard = self.deployment.lock().unwrap();
        let deployment = guard.as_ref().ok_or(ServerError::NoTopologyDeployed)?;
        Ok(f(&deployment.plan))
    }

    /// Current simulation config
    pub fn simulation_config(&self) -> SimulationConfig {
        self.sim_config.lock().unwrap().clone()
    }

    /// Merge `update` into the simulation config, returning the result
    pub fn update_simulation_config(&self, update: SimulationConfigUpdate) -> SimulationConfig {
        let mut config = self.sim_config.lock().unwrap();
        if let Some(bus_latency_us) = update.bus_latency_us {
            config.bus_latency_us = bus_latency_us;
        }
        if let Some(timestep_us) = update.timestep_us {
            config.timestep_us = timestep_us;
        }
        config.clone()
    }

    /// Clear the active deployment (used by `/api/emulator/reset`)
    pub fn clear_deployment(&self) {
        *self.deployment.lock().unwrap() = None;
    }
}

/// `(backplane, node_id)` pairs in a stable, flattened order: sorted by
/// backplane name, then by node id -- used to map the flat `{id}` path
/// parameter the HTTP surface exposes onto a physical node.
pub fn flat_nodes(cluster: &Cluster) -> Vec<(String, u8)> {
    let mut names = cluster.backplane_names();
    names.sort();
    let mut out = Vec::new();
    for name in names {
        let _ = cluster.with_backplane(&name, |bp| {
            for node in bp.nodes() {
                out.push((name.clone(), node.id));
            }
        });
    }
    out
}

/// Resolve a flat node id into its `(backplane, node_id)` location
pub fn resolve_node(cluster: &Cluster, id: u8) -> ServerResult<(String, u8)> {
    flat_nodes(cluster)
        .into_iter()
        .nth(id as usize)
        .ok_or(ServerError::NodeNotFound(id))
}

/// Every backplane is assigned a stable numeric index (sorted by name) for
/// use as a [`ncp_layout::SpikePacket`] `source_backplane` / engine id. Only
/// backplane 0 ever has synapses that resolve correctly against the
/// compiler's same-backplane-only synapse encoding (see DESIGN.md); this
/// indexing exists so multi-backplane clusters still have a well-defined,
/// deterministic numbering even though cross-backplane spike delivery is a
/// known limitation.
pub fn backplane_index(cluster: &Cluster, name: &str) -> u8 {
    let mut names = cluster.backplane_names();
    names.sort();
    names.iter().position(|n| n == name).unwrap_or(0) as u8
}
