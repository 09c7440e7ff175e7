//! Health endpoint.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status, always "ok" while the listener is up.
    pub status: String,

    /// Service version.
    pub version: String,

    /// Number of live gateway processes.
    pub running: usize,

    /// Number of bots known to the store.
    pub total: usize,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Fleet-level health summary. Never fails.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let running = state.supervisor().running_count().await;
    let total = match state.store().list().await {
        Ok(ids) => ids.len(),
        Err(e) => {
            warn!(error = %e, "Failed to count bots for health check");
            0
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        running,
        total,
    })
}
