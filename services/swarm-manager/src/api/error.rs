//! API error type and domain error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;
use crate::supervisor::SupervisorError;

/// JSON body returned for every API error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// An API-level error: a status code plus a stable error code and message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => {
                Self::not_found("bot_not_found", format!("Bot {id} not found"))
            }
            StoreError::AlreadyExists(id) => {
                Self::conflict("bot_exists", format!("Bot {id} already exists"))
            }
            StoreError::UnsafeWorkspacePath(path) => Self::bad_request(
                "unsafe_workspace_path",
                format!("Workspace path {path:?} escapes the workspace"),
            ),
            StoreError::PortsExhausted => {
                tracing::error!("Gateway port space exhausted");
                Self::internal("ports_exhausted", "No gateway ports left to allocate")
            }
            StoreError::Record(e) => {
                tracing::error!(error = %e, "Corrupt bot record");
                Self::internal("internal_error", "Failed to read bot record")
            }
            StoreError::Io(e) => {
                tracing::error!(error = %e, "Bot store I/O error");
                Self::internal("internal_error", "Bot store operation failed")
            }
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::Store(e) => e.into(),
            SupervisorError::Spawn { id, source } => {
                tracing::error!(bot_id = %id, error = %source, "Gateway spawn failed");
                Self::internal("spawn_failed", format!("Failed to launch gateway for {id}"))
            }
            SupervisorError::LaunchConfig(e) => {
                tracing::error!(error = %e, "Launch config serialization failed");
                Self::internal("internal_error", "Failed to write launch config")
            }
            SupervisorError::Io(e) => {
                tracing::error!(error = %e, "Supervisor I/O error");
                Self::internal("internal_error", "Supervisor operation failed")
            }
        }
    }
}
