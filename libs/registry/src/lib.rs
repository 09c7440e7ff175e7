//! # swarm-registry
//!
//! Client boundary for the remote registry that holds fleet metadata and
//! the two content catalogs (SpellBook and MyBuddyBook).
//!
//! The registry is advisory: bot lifecycle correctness never depends on it.
//! The orchestrator talks to it through the [`Registry`] trait so that a
//! missing or unreachable registry degrades to [`NoopRegistry`] instead of
//! failing lifecycle operations.

mod error;
mod http;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::RegistryError;
pub use http::HttpRegistry;

/// Reported lifecycle status of a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    /// Registered but never started.
    Inactive,
    /// Process is live.
    Running,
    /// Process has exited.
    Stopped,
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BotStatus::Inactive => "inactive",
            BotStatus::Running => "running",
            BotStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// SpellBook access level. Magicians see the buddy-level entries too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellLevel {
    #[default]
    Buddy,
    Magician,
}

impl SpellLevel {
    /// The set of levels visible at this access level.
    pub fn visible_levels(self) -> &'static [&'static str] {
        match self {
            SpellLevel::Buddy => &["buddy"],
            SpellLevel::Magician => &["buddy", "magician"],
        }
    }
}

/// MyBuddyBook visibility filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    All,
    Magicians,
}

impl Visibility {
    /// The set of visibility values matched by this filter.
    pub fn visible_values(self) -> &'static [&'static str] {
        match self {
            Visibility::All => &["all"],
            Visibility::Magicians => &["all", "magicians"],
        }
    }
}

/// Metadata row submitted when a bot is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuddyRegistration {
    pub buddy_id: String,
    pub human_name: String,
    pub buddy_name: String,
    pub role: String,
    pub status: BotStatus,
    pub channels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_token: Option<String>,
    pub metadata: Value,
}

/// A new MyBuddyBook submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBookEntry {
    pub title: String,
    pub category: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_buddy_id: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Capabilities the orchestrator needs from the remote registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Record a newly created bot. Best-effort from the caller's view.
    async fn register_bot(&self, registration: &BuddyRegistration) -> Result<(), RegistryError>;

    /// Report a bot's lifecycle status. Best-effort, fire-and-forget.
    async fn update_status(
        &self,
        buddy_id: &str,
        status: BotStatus,
        port: Option<u16>,
    ) -> Result<(), RegistryError>;

    /// Fetch active SpellBook entries visible at the given level.
    async fn spellbook(&self, level: SpellLevel) -> Result<Vec<Value>, RegistryError>;

    /// Fetch MyBuddyBook entries matching the given visibility filter.
    async fn mybuddybook(&self, visibility: Visibility) -> Result<Vec<Value>, RegistryError>;

    /// Append a MyBuddyBook entry, returning the created row.
    ///
    /// This is the one registry write whose failure the caller must see.
    async fn append_mybuddybook(&self, entry: &NewBookEntry) -> Result<Value, RegistryError>;
}

/// Registry that accepts every write and returns empty catalogs.
///
/// Used when no registry credentials are configured, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistry;

#[async_trait]
impl Registry for NoopRegistry {
    async fn register_bot(&self, _registration: &BuddyRegistration) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn update_status(
        &self,
        _buddy_id: &str,
        _status: BotStatus,
        _port: Option<u16>,
    ) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn spellbook(&self, _level: SpellLevel) -> Result<Vec<Value>, RegistryError> {
        Ok(Vec::new())
    }

    async fn mybuddybook(&self, _visibility: Visibility) -> Result<Vec<Value>, RegistryError> {
        Ok(Vec::new())
    }

    async fn append_mybuddybook(&self, entry: &NewBookEntry) -> Result<Value, RegistryError> {
        // Echo the submission back so callers still get a row shape.
        serde_json::to_value(entry).map_err(|e| RegistryError::UnexpectedResponse(e.to_string()))
    }
}
