//! Bot lifecycle endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use swarm_id::BotId;
use swarm_registry::{BotStatus, BuddyRegistration};

use crate::api::error::ApiError;
use crate::state::AppState;
use crate::store::{BotConfig, BotRecord};

/// Marker substituted for the whole `env` map in API responses. Callers
/// must not be able to tell which variables exist.
const ENV_REDACTED: &str = "***";

/// Create bot routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bots", post(create_bot))
        .route("/bots", get(list_bots))
        .route("/bots/{id}", get(get_bot))
        .route("/bots/{id}", delete(delete_bot))
        .route("/bots/{id}/start", post(start_bot))
        .route("/bots/{id}/stop", post(stop_bot))
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to create a new bot. Both fields are required.
#[derive(Debug, Deserialize)]
pub struct CreateBotRequest {
    pub id: Option<String>,
    pub config: Option<BotConfig>,
}

#[derive(Debug, Serialize)]
pub struct CreateBotResponse {
    pub id: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct BotSummary {
    pub id: String,
    pub status: &'static str,
    pub port: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct ListBotsResponse {
    pub bots: Vec<BotSummary>,
}

#[derive(Debug, Serialize)]
pub struct BotDetailResponse {
    pub id: String,
    pub status: &'static str,
    pub port: Option<u16>,
    /// Persisted record with the env map redacted.
    pub config: Value,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub ok: bool,
    pub was_running: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
}

fn status_label(running: bool) -> &'static str {
    if running {
        "running"
    } else {
        "stopped"
    }
}

fn parse_id(raw: &str) -> Result<BotId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::bad_request("invalid_bot_id", format!("Invalid bot ID: {e}")))
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a new bot.
///
/// POST /bots
async fn create_bot(
    State(state): State<AppState>,
    Json(req): Json<CreateBotRequest>,
) -> Result<Response, ApiError> {
    let (Some(raw_id), Some(config)) = (req.id, req.config) else {
        return Err(ApiError::bad_request(
            "missing_field",
            "Missing id or config",
        ));
    };
    let id = parse_id(&raw_id)?;

    let registration = registration_for(&id, &config);
    let record = state.store().create(&id, config).await?;

    // Registration is advisory metadata; the store is the source of truth,
    // so a registry failure never fails the create.
    let registry = state.registry();
    let reg_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = registry.register_bot(&registration).await {
            warn!(bot_id = %reg_id, error = %e, "Registry registration failed");
        }
    });

    let response = CreateBotResponse {
        id: id.to_string(),
        port: record.port,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// List all bots with their lifecycle status.
///
/// GET /bots
async fn list_bots(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let ids = state.store().list().await?;

    let mut bots = Vec::with_capacity(ids.len());
    for id in ids {
        let port = state.supervisor().port_of(&id).await;
        bots.push(BotSummary {
            id: id.to_string(),
            status: status_label(port.is_some()),
            port,
        });
    }

    Ok(Json(ListBotsResponse { bots }))
}

/// Get one bot's details, with secrets redacted.
///
/// GET /bots/{id}
async fn get_bot(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let record = state.store().read(&id).await?;
    let port = state.supervisor().port_of(&id).await;

    Ok(Json(BotDetailResponse {
        id: id.to_string(),
        status: status_label(port.is_some()),
        port,
        config: redacted_config(&record),
    }))
}

/// Start a bot's gateway process.
///
/// POST /bots/{id}/start
async fn start_bot(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let port = state.supervisor().start(&id).await?;
    Ok(Json(StartResponse { port }))
}

/// Stop a bot's gateway process. Not-running is a benign no-op.
///
/// POST /bots/{id}/stop
async fn stop_bot(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let was_running = state.supervisor().stop(&id).await;
    Ok(Json(StopResponse {
        ok: true,
        was_running,
    }))
}

/// Delete a bot: stop first, then remove its on-disk footprint.
///
/// DELETE /bots/{id}
async fn delete_bot(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    state.supervisor().stop(&id).await;
    state.store().delete(&id).await?;
    Ok(Json(DeleteResponse { ok: true }))
}

// =============================================================================
// Helpers
// =============================================================================

/// Serialize a record for API consumption with the entire env submap
/// replaced by the redaction marker.
fn redacted_config(record: &BotRecord) -> Value {
    let mut doc = serde_json::to_value(record).unwrap_or_else(|_| json!({}));
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("env".to_string(), Value::String(ENV_REDACTED.to_string()));
    }
    doc
}

/// Build the advisory registry row for a new bot.
///
/// Human and buddy names fall back to splitting the id on the first `-`.
fn registration_for(id: &BotId, config: &BotConfig) -> BuddyRegistration {
    let mut parts = id.as_str().splitn(2, '-');
    let human_default = parts.next().unwrap_or(id.as_str()).to_string();
    let buddy_default = parts.next().unwrap_or(id.as_str()).to_string();

    let string_field = |key: &str, default: String| -> String {
        config
            .extra
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(default)
    };

    let channels = config
        .extra
        .get("channels")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    BuddyRegistration {
        buddy_id: id.to_string(),
        human_name: string_field("human_name", human_default),
        buddy_name: string_field("buddy_name", buddy_default),
        role: string_field("role", "buddy".to_string()),
        status: BotStatus::Inactive,
        channels,
        telegram_token: config.env.get("TELEGRAM_BOT_TOKEN").cloned(),
        metadata: json!({ "created_via": "swarm_manager" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn redacted_config_replaces_whole_env_map() {
        let mut env = BTreeMap::new();
        env.insert("TELEGRAM_BOT_TOKEN".to_string(), "hunter2".to_string());
        env.insert("FOO".to_string(), "bar".to_string());
        let record = BotRecord {
            port: 18001,
            config: BotConfig {
                env,
                ..Default::default()
            },
        };

        let doc = redacted_config(&record);
        assert_eq!(doc["env"], ENV_REDACTED);
        let rendered = doc.to_string();
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("FOO"));
    }

    #[test]
    fn registration_splits_id_for_names() {
        let id: BotId = "bob-buddy".parse().unwrap();
        let reg = registration_for(&id, &BotConfig::default());
        assert_eq!(reg.human_name, "bob");
        assert_eq!(reg.buddy_name, "buddy");
        assert_eq!(reg.role, "buddy");
        assert_eq!(reg.status, BotStatus::Inactive);
    }

    #[test]
    fn registration_prefers_explicit_fields_and_token() {
        let id: BotId = "solo".parse().unwrap();
        let mut config = BotConfig::default();
        config
            .env
            .insert("TELEGRAM_BOT_TOKEN".to_string(), "tok".to_string());
        config.extra.insert(
            "human_name".to_string(),
            Value::String("Robert".to_string()),
        );
        config
            .extra
            .insert("channels".to_string(), json!(["telegram"]));

        let reg = registration_for(&id, &config);
        assert_eq!(reg.human_name, "Robert");
        assert_eq!(reg.buddy_name, "solo");
        assert_eq!(reg.channels, vec!["telegram"]);
        assert_eq!(reg.telegram_token.as_deref(), Some("tok"));
    }
}
