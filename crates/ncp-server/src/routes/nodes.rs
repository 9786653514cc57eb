//! Node inspection, reset, memory, and firmware endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::state::{backplane_index, flat_nodes, resolve_node, AppState};

#[derive(Debug, Serialize)]
pub struct LedStateBody {
    r: u8,
    g: u8,
    b: u8,
}

#[derive(Debug, Serialize)]
pub struct NodeStatsBody {
    bus_messages_sent: u64,
    bus_messages_received: u64,
    memory_reads: u64,
    memory_writes: u64,
    resets: u64,
}

#[derive(Debug, Serialize)]
pub struct NodeInfo {
    id: u8,
    node_id: u8,
    backplane_id: u8,
    status: String,
    uptime_ms: u64,
    memory_free: usize,
    led_state: LedStateBody,
    stats: NodeStatsBody,
    neuron_count: usize,
}

fn node_info(state: &AppState, flat_id: u8, backplane: &str, node_id: u8) -> ServerResult<NodeInfo> {
    let info = state
        .cluster
        .with_backplane(backplane, |bp| {
            let node = bp.node(node_id)?;
            let led = node.led();
            let stats = node.stats();
            Ok(NodeInfo {
                id: flat_id,
                node_id,
                backplane_id: backplane_index(&state.cluster, backplane),
                status: node.status().as_str().to_string(),
                uptime_ms: node.uptime_ms(),
                memory_free: node.free_memory(),
                led_state: LedStateBody { r: led.r, g: led.g, b: led.b },
                stats: NodeStatsBody {
                    bus_messages_sent: stats.bus_messages_sent,
                    bus_messages_received: stats.bus_messages_received,
                    memory_reads: stats.memory_reads,
                    memory_writes: stats.memory_writes,
                    resets: stats.resets,
                },
                neuron_count: node.parsed_neurons().len(),
            })
        })
        .map_err(ServerError::from)??;
    Ok(info)
}

#[derive(Debug, Serialize)]
pub struct NodeListBody {
    nodes: Vec<NodeInfo>,
}

pub async fn list_nodes(State(state): State<Arc<AppState>>) -> ServerResult<Json<NodeListBody>> {
    let mut nodes = Vec::new();
    for (flat_id, (backplane, node_id)) in flat_nodes(&state.cluster).into_iter().enumerate() {
        nodes.push(node_info(&state, flat_id as u8, &backplane, node_id)?);
    }
    Ok(Json(NodeListBody { nodes }))
}

pub async fn get_node(State(state): State<Arc<AppState>>, Path(id): Path<u8>) -> ServerResult<Json<NodeInfo>> {
    let (backplane, node_id) = resolve_node(&state.cluster, id)?;
    Ok(Json(node_info(&state, id, &backplane, node_id)?))
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    status: &'static str,
}

pub async fn reset_node(State(state): State<Arc<AppState>>, Path(id): Path<u8>) -> ServerResult<Json<StatusBody>> {
    let (backplane, node_id) = resolve_node(&state.cluster, id)?;
    state
        .cluster
        .with_backplane_mut(&backplane, |bp| bp.node_mut(node_id).map(|n| n.reset()))
        .map_err(ServerError::from)??;
    Ok(Json(StatusBody { status: "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    addr: u32,
    length: usize,
}

#[derive(Debug, Serialize)]
pub struct MemoryReadBody {
    addr: u32,
    length: usize,
    data: String,
}

pub async fn read_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u8>,
    Query(query): Query<MemoryQuery>,
) -> ServerResult<Json<MemoryReadBody>> {
    let (backplane, node_id) = resolve_node(&state.cluster, id)?;
    let data = state
        .cluster
        .with_backplane_mut(&backplane, |bp| bp.node_mut(node_id)?.read_memory(query.addr, query.length))
        .map_err(ServerError::from)??;
    Ok(Json(MemoryReadBody {
        addr: query.addr,
        length: query.length,
        data: BASE64.encode(data),
    }))
}

#[derive(Debug, Deserialize)]
pub struct MemoryWriteRequest {
    addr: u32,
    data: String,
}

#[derive(Debug, Serialize)]
pub struct MemoryWriteBody {
    status: &'static str,
    bytes_written: usize,
}

pub async fn write_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u8>,
    Json(body): Json<MemoryWriteRequest>,
) -> ServerResult<Json<MemoryWriteBody>> {
    let (backplane, node_id) = resolve_node(&state.cluster, id)?;
    let bytes = BASE64.decode(body.data)?;
    let bytes_written = state
        .cluster
        .with_backplane_mut(&backplane, |bp| bp.node_mut(node_id)?.write_memory(body.addr, &bytes))
        .map_err(ServerError::from)??;
    Ok(Json(MemoryWriteBody { status: "ok", bytes_written }))
}

#[derive(Debug, Serialize)]
pub struct FirmwareInfoBody {
    name: String,
    version: u32,
}

pub async fn get_firmware(State(state): State<Arc<AppState>>, Path(id): Path<u8>) -> ServerResult<Json<FirmwareInfoBody>> {
    let (backplane, node_id) = resolve_node(&state.cluster, id)?;
    let body = state
        .cluster
        .with_backplane(&backplane, |bp| {
            let node = bp.node(node_id)?;
            Ok(match node.firmware_header() {
                Some(header) => FirmwareInfoBody { name: header.name.clone(), version: header.version },
                None => FirmwareInfoBody { name: "None".to_string(), version: 0 },
            })
        })
        .map_err(ServerError::from)??;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct FlashFirmwareRequest {
    firmware: String,
}

pub async fn flash_firmware(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u8>,
    Json(body): Json<FlashFirmwareRequest>,
) -> ServerResult<Json<StatusBody>> {
    let (backplane, node_id) = resolve_node(&state.cluster, id)?;
    let bytes = BASE64.decode(body.firmware)?;
    state
        .cluster
        .with_backplane_mut(&backplane, |bp| bp.node_mut(node_id)?.load_firmware(&bytes))
        .map_err(ServerError::from)??;
    Ok(Json(StatusBody { status: "ok" }))
}
