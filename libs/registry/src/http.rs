//! PostgREST-backed registry client.
//!
//! Talks to the registry's REST surface (`/rest/v1/<table>`) using the
//! standard PostgREST filter syntax. Three tables are involved:
//!
//! - `swarm_buddies` — fleet membership and status
//! - `swarm_spellbook` — SpellBook catalog
//! - `swarm_mybuddybook` — MyBuddyBook catalog

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    BotStatus, BuddyRegistration, NewBookEntry, Registry, RegistryError, SpellLevel, Visibility,
};

const BUDDIES_TABLE: &str = "swarm_buddies";
const SPELLBOOK_TABLE: &str = "swarm_spellbook";
const MYBUDDYBOOK_TABLE: &str = "swarm_mybuddybook";

/// Registry client over the PostgREST HTTP API.
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRegistry {
    /// Create a new client for the given registry URL and API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// PostgREST `in.(a,b)` filter expression.
    fn in_filter(values: &[&str]) -> String {
        format!("in.({})", values.join(","))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RegistryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn register_bot(&self, registration: &BuddyRegistration) -> Result<(), RegistryError> {
        debug!(buddy_id = %registration.buddy_id, "Registering bot");

        let response = self
            .request(self.client.post(self.table_url(BUDDIES_TABLE)))
            .header("Prefer", "return=minimal")
            .json(registration)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        buddy_id: &str,
        status: BotStatus,
        port: Option<u16>,
    ) -> Result<(), RegistryError> {
        debug!(buddy_id = %buddy_id, status = %status, "Updating bot status");

        let body = json!({
            "status": status,
            "port": port,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let response = self
            .request(self.client.patch(self.table_url(BUDDIES_TABLE)))
            .query(&[("buddy_id", format!("eq.{buddy_id}"))])
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn spellbook(&self, level: SpellLevel) -> Result<Vec<Value>, RegistryError> {
        let response = self
            .request(self.client.get(self.table_url(SPELLBOOK_TABLE)))
            .query(&[
                ("select", "*".to_string()),
                ("spell_level", Self::in_filter(level.visible_levels())),
                ("is_active", "eq.true".to_string()),
            ])
            .send()
            .await?;

        let rows = Self::check(response).await?.json().await?;
        Ok(rows)
    }

    async fn mybuddybook(&self, visibility: Visibility) -> Result<Vec<Value>, RegistryError> {
        let response = self
            .request(self.client.get(self.table_url(MYBUDDYBOOK_TABLE)))
            .query(&[
                ("select", "*".to_string()),
                ("visibility", Self::in_filter(visibility.visible_values())),
            ])
            .send()
            .await?;

        let rows = Self::check(response).await?.json().await?;
        Ok(rows)
    }

    async fn append_mybuddybook(&self, entry: &NewBookEntry) -> Result<Value, RegistryError> {
        let response = self
            .request(self.client.post(self.table_url(MYBUDDYBOOK_TABLE)))
            .header("Prefer", "return=representation")
            .json(entry)
            .send()
            .await?;

        let mut rows: Vec<Value> = Self::check(response).await?.json().await?;
        if rows.is_empty() {
            return Err(RegistryError::UnexpectedResponse(
                "insert returned no rows".to_string(),
            ));
        }
        Ok(rows.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slash_from_base_url() {
        let registry = HttpRegistry::new("http://registry.local/", "key");
        assert_eq!(
            registry.table_url("swarm_buddies"),
            "http://registry.local/rest/v1/swarm_buddies"
        );
    }

    #[test]
    fn in_filter_joins_values() {
        assert_eq!(
            HttpRegistry::in_filter(&["buddy", "magician"]),
            "in.(buddy,magician)"
        );
    }
}
