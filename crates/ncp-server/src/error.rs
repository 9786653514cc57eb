//! Error handling for the HTTP control surface

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced by the HTTP control surface
#[derive(Error, Debug)]
pub enum ServerError {
    /// Topology compilation failed
    #[error("compile error: {0}")]
    Compile(#[from] ncp_compiler::CompileError),

    /// Emulator-level failure (memory, node, firmware)
    #[error("emulator error: {0}")]
    Emulator(#[from] ncp_emulator::EmulatorError),

    /// Malformed base64 payload
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Malformed JSON body or topology document
    #[error("invalid request body: {0}")]
    Json(#[from] serde_json::Error),

    /// Referenced a node id outside 0..=255 or not present on any backplane
    #[error("node {0} not found")]
    NodeNotFound(u8),

    /// No topology has been deployed yet
    #[error("no topology deployed")]
    NoTopologyDeployed,

    /// A request field was invalid for reasons specific to the endpoint
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ServerError {
    /// Build a [`ServerError::BadRequest`]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Compile(_) => StatusCode::BAD_REQUEST,
            Self::Emulator(ncp_emulator::EmulatorError::NodeNotFound { .. })
            | Self::Emulator(ncp_emulator::EmulatorError::BackplaneNotFound { .. })
            | Self::NodeNotFound(_) => StatusCode::NOT_FOUND,
            Self::NoTopologyDeployed => StatusCode::NOT_FOUND,
            Self::Emulator(_) | Self::Base64(_) | Self::Json(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody { error: self.to_string() };
        (status, axum::Json(body)).into_response()
    }
}
