//! Filesystem-backed bot directory store.
//!
//! Each bot owns one directory under the bots root:
//!
//! ```text
//! <root>/<bot-id>/
//!   bot.json        persisted BotRecord
//!   gateway.json    launch config, rewritten on every start
//!   workspace/      user files, materialized at creation
//!   state/          gateway-owned state
//! ```
//!
//! The store is authoritative for bot existence; the remote registry only
//! mirrors it. Ports are allocated here, once, at creation time, from a
//! monotonic counter seeded by scanning existing records on open.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use swarm_id::BotId;

/// Persisted record filename inside a bot directory.
pub const RECORD_FILE: &str = "bot.json";
/// Generated launch config filename.
pub const LAUNCH_FILE: &str = "gateway.json";
/// Workspace subdirectory name.
pub const WORKSPACE_DIR: &str = "workspace";
/// Gateway state subdirectory name.
pub const STATE_DIR: &str = "state";

/// Errors from bot directory operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bot {0} not found")]
    NotFound(BotId),

    #[error("bot {0} already exists")]
    AlreadyExists(BotId),

    #[error("unsafe workspace path: {0:?}")]
    UnsafeWorkspacePath(String),

    #[error("gateway port space exhausted")]
    PortsExhausted,

    #[error("invalid bot record: {0}")]
    Record(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn default_autostart() -> bool {
    true
}

/// Caller-supplied bot configuration.
///
/// `env` and the engine subtree feed the gateway process at start time;
/// `workspace` is materialized into files once, at creation. Unknown fields
/// round-trip untouched so the registry registration can read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<BTreeMap<String, String>>,

    #[serde(default = "default_autostart")]
    pub autostart: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            workspace: None,
            autostart: true,
            engine: None,
            extra: Map::new(),
        }
    }
}

/// One fleet member, as persisted in `bot.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRecord {
    /// Gateway port, fixed at creation.
    pub port: u16,

    #[serde(flatten)]
    pub config: BotConfig,
}

/// Filesystem-backed store of bot records.
pub struct BotStore {
    root: PathBuf,
    next_port: AtomicU32,
}

impl BotStore {
    /// Open the store, creating the root directory if needed.
    ///
    /// Seeds the port allocator at `base_port`, or one past the highest
    /// port found in existing records.
    pub async fn open(root: impl Into<PathBuf>, base_port: u16) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let mut next = u32::from(base_port);
        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let record_path = entry.path().join(RECORD_FILE);
            match read_record_at(&record_path).await {
                Ok(record) => next = next.max(u32::from(record.port) + 1),
                Err(e) => {
                    warn!(path = %record_path.display(), error = %e, "Skipping unreadable bot record");
                }
            }
        }

        debug!(root = %root.display(), next_port = next, "Bot store opened");
        Ok(Self {
            root,
            next_port: AtomicU32::new(next),
        })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory owned by the given bot.
    pub fn bot_dir(&self, id: &BotId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Create a bot's on-disk footprint and persist its record.
    ///
    /// Fails with `AlreadyExists` if the bot's directory is present, leaving
    /// it untouched. The directory itself is the uniqueness claim: `mkdir`
    /// is atomic, so of two concurrent creates for the same id exactly one
    /// wins and only the winner allocates a port. Workspace paths are
    /// validated before anything is written, so a traversal attempt creates
    /// nothing.
    pub async fn create(&self, id: &BotId, config: BotConfig) -> Result<BotRecord, StoreError> {
        let bot_dir = self.bot_dir(id);

        let workspace_dir = bot_dir.join(WORKSPACE_DIR);
        let mut files = Vec::new();
        if let Some(workspace) = &config.workspace {
            for (rel, content) in workspace {
                files.push((workspace_path(&workspace_dir, rel)?, content.clone()));
            }
        }

        match fs::create_dir(&bot_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        fs::create_dir(&workspace_dir).await?;
        fs::create_dir(bot_dir.join(STATE_DIR)).await?;

        let port = match self.allocate_port() {
            Ok(port) => port,
            Err(e) => {
                let _ = fs::remove_dir_all(&bot_dir).await;
                return Err(e);
            }
        };
        let record = BotRecord { port, config };
        fs::write(
            bot_dir.join(RECORD_FILE),
            serde_json::to_vec_pretty(&record)?,
        )
        .await?;

        for (path, content) in files {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, content).await?;
        }

        debug!(bot_id = %id, port, "Bot created");
        Ok(record)
    }

    /// Read a bot's persisted record.
    pub async fn read(&self, id: &BotId) -> Result<BotRecord, StoreError> {
        let path = self.bot_dir(id).join(RECORD_FILE);
        match read_record_at(&path).await {
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.clone()))
            }
            other => other,
        }
    }

    /// List all known bot ids in lexicographic order.
    pub async fn list(&self) -> Result<Vec<BotId>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_string_lossy().parse::<BotId>() {
                Ok(id) => ids.push(id),
                Err(e) => {
                    debug!(name = %name.to_string_lossy(), error = %e, "Ignoring non-bot directory");
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove a bot's entire on-disk footprint. Idempotent.
    pub async fn delete(&self, id: &BotId) -> Result<(), StoreError> {
        match fs::remove_dir_all(self.bot_dir(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn allocate_port(&self) -> Result<u16, StoreError> {
        let next = self.next_port.fetch_add(1, Ordering::SeqCst);
        u16::try_from(next).map_err(|_| StoreError::PortsExhausted)
    }
}

async fn read_record_at(path: &Path) -> Result<BotRecord, StoreError> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Join a caller-supplied relative path onto the workspace directory,
/// rejecting anything that could escape it.
fn workspace_path(workspace_dir: &Path, rel: &str) -> Result<PathBuf, StoreError> {
    let path = Path::new(rel);
    if rel.is_empty() || path.is_absolute() {
        return Err(StoreError::UnsafeWorkspacePath(rel.to_string()));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => return Err(StoreError::UnsafeWorkspacePath(rel.to_string())),
        }
    }
    Ok(workspace_dir.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn id(s: &str) -> BotId {
        s.parse().unwrap()
    }

    fn config_with_workspace(files: &[(&str, &str)]) -> BotConfig {
        BotConfig {
            workspace: Some(
                files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_materializes_directories_and_workspace() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), 18001).await.unwrap();

        let mut config = config_with_workspace(&[("README.md", "hi"), ("notes/day1.md", "dear diary")]);
        config.env.insert("FOO".to_string(), "1".to_string());

        let record = store.create(&id("alpha"), config).await.unwrap();
        assert_eq!(record.port, 18001);

        let bot_dir = store.bot_dir(&id("alpha"));
        assert!(bot_dir.join(WORKSPACE_DIR).is_dir());
        assert!(bot_dir.join(STATE_DIR).is_dir());
        assert_eq!(
            std::fs::read_to_string(bot_dir.join(WORKSPACE_DIR).join("README.md")).unwrap(),
            "hi"
        );
        assert_eq!(
            std::fs::read_to_string(bot_dir.join(WORKSPACE_DIR).join("notes/day1.md")).unwrap(),
            "dear diary"
        );

        let back = store.read(&id("alpha")).await.unwrap();
        assert_eq!(back.port, 18001);
        assert_eq!(back.config.env.get("FOO").map(String::as_str), Some("1"));
        assert!(back.config.autostart);
    }

    #[tokio::test]
    async fn create_fails_on_existing_directory_and_leaves_it_alone() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), 18001).await.unwrap();

        store
            .create(&id("alpha"), config_with_workspace(&[("keep.txt", "original")]))
            .await
            .unwrap();

        let err = store
            .create(&id("alpha"), config_with_workspace(&[("keep.txt", "clobbered")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let kept = store
            .bot_dir(&id("alpha"))
            .join(WORKSPACE_DIR)
            .join("keep.txt");
        assert_eq!(std::fs::read_to_string(kept).unwrap(), "original");
    }

    #[rstest]
    #[case("../escape.txt")]
    #[case("/etc/passwd")]
    #[case("a/../../b")]
    #[case("")]
    #[tokio::test]
    async fn workspace_traversal_is_rejected_before_anything_is_written(#[case] bad: &str) {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), 18001).await.unwrap();

        let err = store
            .create(&id("evil"), config_with_workspace(&[(bad, "x")]))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::UnsafeWorkspacePath(_)),
            "path {bad:?} should be rejected"
        );
        assert!(!store.bot_dir(&id("evil")).exists());
    }

    #[tokio::test]
    async fn concurrent_creates_admit_exactly_one_winner() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), 18001).await.unwrap();

        for round in 0..20 {
            let name = format!("bot{round}");
            let bid = id(&name);
            let (a, b) = tokio::join!(
                store.create(&bid, BotConfig::default()),
                store.create(&bid, BotConfig::default()),
            );

            let (winner, loser) = match (a, b) {
                (Ok(record), Err(e)) | (Err(e), Ok(record)) => (record, e),
                other => panic!("round {round}: expected one winner, got {other:?}"),
            };
            assert!(matches!(loser, StoreError::AlreadyExists(_)));

            // The persisted record belongs to the winner, not a last writer.
            let persisted = store.read(&bid).await.unwrap();
            assert_eq!(persisted.port, winner.port, "round {round}");
        }
    }

    #[tokio::test]
    async fn read_missing_bot_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), 18001).await.unwrap();
        assert!(matches!(
            store.read(&id("ghost")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_is_lexicographic() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), 18001).await.unwrap();

        for name in ["charlie", "alpha", "bravo"] {
            store.create(&id(name), BotConfig::default()).await.unwrap();
        }

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|i| i.to_string())
            .collect();
        assert_eq!(ids, vec!["alpha", "bravo", "charlie"]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), 18001).await.unwrap();

        store.create(&id("alpha"), BotConfig::default()).await.unwrap();
        store.delete(&id("alpha")).await.unwrap();
        assert!(!store.bot_dir(&id("alpha")).exists());
        store.delete(&id("alpha")).await.unwrap();
    }

    #[tokio::test]
    async fn ports_are_allocated_in_creation_order() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), 18001).await.unwrap();

        for (name, expected) in [("a", 18001), ("b", 18002), ("c", 18003)] {
            let record = store.create(&id(name), BotConfig::default()).await.unwrap();
            assert_eq!(record.port, expected, "bot {name}");
        }
    }

    #[tokio::test]
    async fn ports_survive_reopen_and_deletion() {
        let dir = TempDir::new().unwrap();
        {
            let store = BotStore::open(dir.path(), 18001).await.unwrap();
            store.create(&id("a"), BotConfig::default()).await.unwrap();
            store.create(&id("b"), BotConfig::default()).await.unwrap();
            store.create(&id("c"), BotConfig::default()).await.unwrap();
            store.delete(&id("b")).await.unwrap();
        }

        // Reopened store seeds past the highest surviving port; "b"'s old
        // port is never reused for a new bot.
        let store = BotStore::open(dir.path(), 18001).await.unwrap();
        let record = store.create(&id("d"), BotConfig::default()).await.unwrap();
        assert_eq!(record.port, 18004);

        let existing = store.read(&id("c")).await.unwrap();
        assert_eq!(existing.port, 18003);
    }

    #[tokio::test]
    async fn port_allocator_errors_instead_of_wrapping() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::open(dir.path(), u16::MAX).await.unwrap();

        let record = store.create(&id("last"), BotConfig::default()).await.unwrap();
        assert_eq!(record.port, u16::MAX);

        let err = store.create(&id("next"), BotConfig::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::PortsExhausted));
        assert!(!store.bot_dir(&id("next")).exists());
    }
}
