//! Route handlers, grouped by the resource they expose

mod emulator;
mod nodes;
mod snn;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/nodes", get(nodes::list_nodes))
        .route("/api/nodes/{id}", get(nodes::get_node))
        .route("/api/nodes/{id}/reset", post(nodes::reset_node))
        .route("/api/nodes/{id}/memory", get(nodes::read_memory).post(nodes::write_memory))
        .route("/api/nodes/{id}/firmware", get(nodes::get_firmware).post(nodes::flash_firmware))
        .route("/api/snn/deploy", post(snn::deploy))
        .route("/api/snn/topology", get(snn::get_topology))
        .route("/api/snn/start", post(snn::start))
        .route("/api/snn/stop", post(snn::stop))
        .route("/api/snn/activity", get(snn::activity))
        .route("/api/snn/events", get(snn::events))
        .route("/api/snn/input", post(snn::input))
        .route("/api/emulator/status", get(emulator::status))
        .route("/api/emulator/reset", post(emulator::reset))
        .route("/api/emulator/config", get(emulator::get_config).post(emulator::update_config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
