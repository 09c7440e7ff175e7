//! Process supervisor: owns zero-or-one live gateway process per bot.
//!
//! The running set is a single mutex-guarded map. Every mutation goes
//! through it: inserts happen in `start` (which holds the lock end to end,
//! serializing concurrent starts for the same id), removals happen only in
//! the per-bot monitor task when the process has actually been reaped.
//! Exit notifications therefore funnel through the same serialization
//! point as explicit lifecycle calls.
//!
//! Stops are confirmed, not optimistic: `stop` delivers SIGTERM, waits up
//! to the configured grace period for the monitor to reap the child,
//! escalates to SIGKILL, and returns only once the entry is gone. A start
//! issued right after a stop can never race the old process.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use swarm_id::BotId;
use swarm_registry::{BotStatus, Registry};

use crate::store::{BotRecord, BotStore, StoreError, LAUNCH_FILE, STATE_DIR, WORKSPACE_DIR};

/// Errors from supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to launch gateway for {id}: {source}")]
    Spawn {
        id: BotId,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write launch config: {0}")]
    LaunchConfig(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A live gateway process, as tracked by the supervisor.
struct RunningBot {
    port: u16,
    pid: Option<u32>,
    stop_tx: watch::Sender<bool>,
    exited_rx: watch::Receiver<bool>,
}

/// Introspection row for one running bot.
#[derive(Debug, Clone)]
pub struct RunningSnapshot {
    pub id: BotId,
    pub port: u16,
    pub pid: Option<u32>,
}

type RunningMap = Arc<Mutex<HashMap<BotId, RunningBot>>>;

/// Owns the bot id to live process mapping.
pub struct Supervisor {
    store: Arc<BotStore>,
    registry: Arc<dyn Registry>,
    gateway_bin: String,
    stop_grace: Duration,
    running: RunningMap,
}

impl Supervisor {
    /// Create a new supervisor.
    pub fn new(
        store: Arc<BotStore>,
        registry: Arc<dyn Registry>,
        gateway_bin: impl Into<String>,
        stop_grace: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            gateway_bin: gateway_bin.into(),
            stop_grace,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start the bot's gateway process, or return the existing port.
    ///
    /// Returns as soon as the process is spawned; no readiness handshake.
    pub async fn start(&self, id: &BotId) -> Result<u16, SupervisorError> {
        let mut running = self.running.lock().await;
        if let Some(bot) = running.get(id) {
            debug!(bot_id = %id, port = bot.port, "Already running");
            return Ok(bot.port);
        }

        let record = self.store.read(id).await?;
        let port = record.port;
        let bot_dir = self.store.bot_dir(id);

        // Fresh launch config on every start.
        let launch = launch_config(&record, port);
        tokio::fs::write(bot_dir.join(LAUNCH_FILE), serde_json::to_vec_pretty(&launch)?).await?;

        info!(bot_id = %id, port, "Starting gateway");

        let mut child = Command::new(&self.gateway_bin)
            .args(["gateway", "start"])
            .current_dir(&bot_dir)
            .envs(&record.config.env)
            .env("BUDDYGW_STATE_DIR", bot_dir.join(STATE_DIR))
            .env("BUDDYGW_WORKSPACE_DIR", bot_dir.join(WORKSPACE_DIR))
            .env("BUDDYGW_CONFIG", bot_dir.join(LAUNCH_FILE))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SupervisorError::Spawn {
                id: id.clone(),
                source: e,
            })?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            forward_stream(id.clone(), stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_stream(id.clone(), stderr, true);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (exited_tx, exited_rx) = watch::channel(false);

        running.insert(
            id.clone(),
            RunningBot {
                port,
                pid,
                stop_tx,
                exited_rx,
            },
        );

        tokio::spawn(monitor(
            Arc::clone(&self.running),
            Arc::clone(&self.registry),
            id.clone(),
            child,
            self.stop_grace,
            stop_rx,
            exited_tx,
        ));

        self.report_status(id, BotStatus::Running, Some(port));
        Ok(port)
    }

    /// Stop the bot's gateway process, waiting until it has exited.
    ///
    /// Returns `false` (a benign no-op) if the bot was not running.
    pub async fn stop(&self, id: &BotId) -> bool {
        let mut exited_rx = {
            let running = self.running.lock().await;
            let Some(bot) = running.get(id) else {
                debug!(bot_id = %id, "Not running");
                return false;
            };
            let _ = bot.stop_tx.send(true);
            bot.exited_rx.clone()
        };

        // The monitor escalates to SIGKILL after the grace period, so this
        // always terminates.
        while !*exited_rx.borrow_and_update() {
            if exited_rx.changed().await.is_err() {
                break;
            }
        }

        info!(bot_id = %id, "Gateway stopped");
        true
    }

    /// Whether a process is currently tracked for this bot.
    pub async fn is_running(&self, id: &BotId) -> bool {
        self.running.lock().await.contains_key(id)
    }

    /// The running port for a bot, if any.
    pub async fn port_of(&self, id: &BotId) -> Option<u16> {
        self.running.lock().await.get(id).map(|b| b.port)
    }

    /// Number of live gateway processes.
    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }

    /// Snapshot of all running bots.
    pub async fn snapshot(&self) -> Vec<RunningSnapshot> {
        let running = self.running.lock().await;
        let mut rows: Vec<RunningSnapshot> = running
            .iter()
            .map(|(id, bot)| RunningSnapshot {
                id: id.clone(),
                port: bot.port,
                pid: bot.pid,
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }

    /// Stop every running bot, sequentially. Used by the shutdown drain.
    pub async fn shutdown_all(&self) {
        let ids: Vec<BotId> = {
            let running = self.running.lock().await;
            running.keys().cloned().collect()
        };

        info!(count = ids.len(), "Draining running bots");
        for id in ids {
            self.stop(&id).await;
        }
    }

    /// Best-effort status report; never blocks or fails the caller.
    fn report_status(&self, id: &BotId, status: BotStatus, port: Option<u16>) {
        let registry = Arc::clone(&self.registry);
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = registry.update_status(id.as_str(), status, port).await {
                warn!(bot_id = %id, error = %e, "Failed to report bot status");
            }
        });
    }
}

/// Launch config document: the record's engine subtree plus the injected
/// local gateway stanza.
fn launch_config(record: &BotRecord, port: u16) -> Value {
    let mut doc = record.config.engine.clone().unwrap_or_else(Map::new);
    doc.insert(
        "gateway".to_string(),
        json!({
            "mode": "local",
            "port": port,
            "host": "127.0.0.1",
        }),
    );
    Value::Object(doc)
}

/// Forward one child stream to the supervisor's log, line by line.
fn forward_stream<R>(id: BotId, stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                warn!(bot_id = %id, "{line}");
            } else {
                info!(bot_id = %id, "{line}");
            }
        }
    });
}

/// Per-bot monitor task. Owns the child; the only place the running map
/// entry is removed.
async fn monitor(
    running: RunningMap,
    registry: Arc<dyn Registry>,
    id: BotId,
    mut child: Child,
    stop_grace: Duration,
    mut stop_rx: watch::Receiver<bool>,
    exited_tx: watch::Sender<bool>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        () = stop_requested(&mut stop_rx) => {
            if let Some(pid) = child.id() {
                debug!(bot_id = %id, pid, "Sending SIGTERM");
                // Safety: plain signal delivery to a pid we just spawned.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }
            match tokio::time::timeout(stop_grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(bot_id = %id, grace_secs = stop_grace.as_secs(), "Graceful stop timed out, killing");
                    if let Err(e) = child.kill().await {
                        warn!(bot_id = %id, error = %e, "Failed to kill gateway");
                    }
                    child.wait().await
                }
            }
        }
    };

    match status {
        Ok(status) => info!(bot_id = %id, code = ?status.code(), "Gateway exited"),
        Err(e) => warn!(bot_id = %id, error = %e, "Failed to reap gateway"),
    }

    running.lock().await.remove(&id);
    let _ = exited_tx.send(true);

    if let Err(e) = registry
        .update_status(id.as_str(), BotStatus::Stopped, None)
        .await
    {
        warn!(bot_id = %id, error = %e, "Failed to report bot exit");
    }
}

/// Resolves when a stop has been requested. Pends forever if the stop
/// sender is gone (the entry was already removed).
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
