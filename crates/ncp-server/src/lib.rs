//! HTTP control surface for an emulated neuromorphic compute cluster.
//!
//! Wires the [`ncp_compiler`] topology compiler and the [`ncp_emulator`]
//! runtime behind an `axum` REST API. See `routes` for the endpoint table.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ServerError, ServerResult};
pub use state::AppState;
