//! SNN topology deployment, lifecycle, and spike injection endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use ncp_layout::{GlobalNeuronId, NodeId, NEURON_TABLE_ADDR};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::state::{backplane_index, AppState};

#[derive(Debug, Serialize)]
pub struct DeployResponse {
    status: &'static str,
    neuron_count: usize,
    synapse_count: usize,
    nodes_used: usize,
}

pub async fn deploy(
    State(state): State<Arc<AppState>>,
    Json(topology): Json<ncp_compiler::TopologyDoc>,
) -> ServerResult<Json<DeployResponse>> {
    let plan = ncp_compiler::compile(&topology, None)?;

    for ((backplane, node_id), bytes) in plan.tables.iter() {
        state
            .cluster
            .with_backplane_mut(backplane, |bp| bp.node_mut(*node_id)?.write_memory(NEURON_TABLE_ADDR, bytes))
            .map_err(ServerError::from)??;
    }

    let response = DeployResponse {
        status: "ok",
        neuron_count: plan.neuron_count,
        synapse_count: plan.synapse_count,
        nodes_used: plan.tables.len(),
    };
    state.set_deployment(topology, plan);
    Ok(Json(response))
}

pub async fn get_topology(State(state): State<Arc<AppState>>) -> ServerResult<Json<ncp_compiler::TopologyDoc>> {
    Ok(Json(state.topology()?))
}

#[derive(Debug, Deserialize, Default)]
pub struct StartRequest {
    timestep_us: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    status: &'static str,
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartRequest>>,
) -> ServerResult<Json<StatusBody>> {
    let timestep_us = body
        .map(|Json(b)| b.timestep_us)
        .unwrap_or(None)
        .unwrap_or_else(|| state.simulation_config().timestep_us);

    let backplanes = state.with_plan(|plan| plan.backplane_nodes.keys().cloned().collect::<Vec<_>>())?;

    for backplane in backplanes {
        let node_ids = state
            .with_plan(|plan| plan.backplane_nodes.get(&backplane).cloned().unwrap_or_default())?;
        for node_id in node_ids {
            let parsed = state
                .cluster
                .with_backplane_mut(&backplane, |bp| bp.node_mut(node_id)?.parse_neuron_table().map(<[_]>::to_vec))
                .map_err(ServerError::from)??;

            let bp_idx = backplane_index(&state.cluster, &backplane);
            let engine = Arc::new(ncp_emulator::SnnEngine::new(bp_idx, node_id));
            engine.load_from_parsed(&parsed);
            state.coordinator.register_engine(bp_idx, node_id, engine);
        }
    }

    state.coordinator.start_all(timestep_us);
    Ok(Json(StatusBody { status: "ok" }))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> ServerResult<Json<StatusBody>> {
    state.coordinator.stop_all();
    Ok(Json(StatusBody { status: "ok" }))
}

#[derive(Debug, Serialize)]
pub struct ActivityBody {
    total_engines: usize,
    total_neurons: usize,
    routing_active: bool,
}

pub async fn activity(State(state): State<Arc<AppState>>) -> Json<ActivityBody> {
    let activity = state.coordinator.global_activity();
    Json(ActivityBody {
        total_engines: activity.total_engines,
        total_neurons: activity.total_neurons,
        routing_active: activity.routing_active,
    })
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_event_count")]
    count: usize,
}

fn default_event_count() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct SpikeEvent {
    global_id: u32,
    backplane: u8,
    node: u8,
    neuron_id: u16,
    timestamp_us: u32,
    value: f32,
}

#[derive(Debug, Serialize)]
pub struct EventsBody {
    spikes: Vec<SpikeEvent>,
}

pub async fn events(State(state): State<Arc<AppState>>, Query(query): Query<EventsQuery>) -> Json<EventsBody> {
    let spikes = state
        .coordinator
        .recent_spikes(query.count)
        .into_iter()
        .map(|s| SpikeEvent {
            global_id: GlobalNeuronId::encode(NodeId::new(s.source_node), s.neuron_id).raw(),
            backplane: s.source_backplane,
            node: s.source_node,
            neuron_id: s.neuron_id,
            timestamp_us: s.timestamp_us,
            value: s.value,
        })
        .collect();
    Json(EventsBody { spikes })
}

#[derive(Debug, Deserialize)]
pub struct InputSpike {
    neuron_id: u16,
    value: f32,
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    spikes: Vec<InputSpike>,
}

#[derive(Debug, Serialize)]
pub struct InputResponse {
    status: &'static str,
    delivered: usize,
}

pub async fn input(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InputRequest>,
) -> ServerResult<Json<InputResponse>> {
    let mut delivered = 0;
    for spike in body.spikes {
        if state.coordinator.inject_spike(spike.neuron_id, spike.value) {
            delivered += 1;
        }
    }
    Ok(Json(InputResponse { status: "ok", delivered }))
}
