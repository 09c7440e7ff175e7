//! SpellBook and MyBuddyBook catalog endpoints.
//!
//! Catalog reads never fail: a registry error degrades to an empty list so
//! a flaky registry cannot take these endpoints down. The one exception is
//! the MyBuddyBook append, which is user-facing and must report failure.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use swarm_registry::{NewBookEntry, SpellLevel, Visibility};

use crate::api::error::ApiError;
use crate::state::AppState;

/// Create catalog routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/spellbook", get(get_spellbook))
        .route("/mybuddybook", get(get_mybuddybook))
        .route("/mybuddybook", post(append_mybuddybook))
}

#[derive(Debug, Deserialize)]
pub struct SpellbookQuery {
    #[serde(default)]
    pub level: SpellLevel,
}

#[derive(Debug, Serialize)]
pub struct SpellbookResponse {
    pub spells: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct BookQuery {
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub entries: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AppendBookRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub author_buddy_id: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AppendBookResponse {
    pub entry: Value,
}

/// GET /spellbook
async fn get_spellbook(
    State(state): State<AppState>,
    Query(query): Query<SpellbookQuery>,
) -> impl IntoResponse {
    let spells = match state.registry().spellbook(query.level).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "SpellBook query failed, returning empty");
            Vec::new()
        }
    };
    Json(SpellbookResponse { spells })
}

/// GET /mybuddybook
async fn get_mybuddybook(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> impl IntoResponse {
    let entries = match state.registry().mybuddybook(query.visibility).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "MyBuddyBook query failed, returning empty");
            Vec::new()
        }
    };
    Json(BookResponse { entries })
}

/// POST /mybuddybook
async fn append_mybuddybook(
    State(state): State<AppState>,
    Json(req): Json<AppendBookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = NewBookEntry {
        title: require_field("title", req.title)?,
        category: require_field("category", req.category)?,
        content: require_field("content", req.content)?,
        author_buddy_id: req.author_buddy_id,
        visibility: req.visibility.unwrap_or_default(),
        tags: req.tags.unwrap_or_default(),
    };

    let created = state
        .registry()
        .append_mybuddybook(&entry)
        .await
        .map_err(|e| ApiError::bad_gateway("registry_error", e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(AppendBookResponse { entry: created }),
    ))
}

fn require_field(name: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(
            "missing_field",
            format!("Missing required field: {name}"),
        )),
    }
}
