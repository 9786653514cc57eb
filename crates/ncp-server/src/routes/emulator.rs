//! Whole-cluster status, reset, and simulation-config endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::{flat_nodes, AppState, SimulationConfigUpdate};

const EMULATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct ClusterInfo {
    backplanes: usize,
    total_nodes: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    emulator: bool,
    version: &'static str,
    cluster_info: ClusterInfo,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        emulator: true,
        version: EMULATOR_VERSION,
        cluster_info: ClusterInfo {
            backplanes: state.cluster.backplane_names().len(),
            total_nodes: flat_nodes(&state.cluster).len(),
        },
    })
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    status: &'static str,
}

pub async fn reset(State(state): State<Arc<AppState>>) -> Json<StatusBody> {
    state.coordinator.stop_all();
    state.cluster.reset_all();
    state.clear_deployment();
    Json(StatusBody { status: "ok" })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<crate::state::SimulationConfig> {
    Json(state.simulation_config())
}

#[derive(Debug, serde::Deserialize)]
pub struct ConfigUpdateRequest {
    simulation: SimulationConfigUpdate,
}

pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConfigUpdateRequest>,
) -> Json<crate::state::SimulationConfig> {
    Json(state.update_simulation_config(body.simulation))
}
