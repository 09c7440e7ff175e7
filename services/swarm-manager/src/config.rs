//! Configuration for the swarm manager.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Swarm manager configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for per-bot state.
    pub bots_dir: PathBuf,

    /// HTTP listen address.
    pub listen_addr: SocketAddr,

    /// First gateway port handed out by the allocator.
    pub base_port: u16,

    /// Executable spawned for each bot.
    pub gateway_bin: String,

    /// How long a stopping bot gets before SIGKILL.
    pub stop_grace: Duration,

    /// Registry endpoint; lifecycle operations work without it.
    pub registry_url: Option<String>,

    /// Registry API key.
    pub registry_key: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let bots_dir = std::env::var("SWARM_BOTS_DIR")
            .unwrap_or_else(|_| "/data/bots".to_string())
            .into();

        // SWARM_LISTEN_ADDR wins; PORT is the deployment platform contract.
        let listen_addr = match std::env::var("SWARM_LISTEN_ADDR") {
            Ok(addr) => addr
                .parse()
                .with_context(|| format!("invalid SWARM_LISTEN_ADDR: {addr}"))?,
            Err(_) => {
                let port: u16 = match std::env::var("PORT") {
                    Ok(raw) => raw.parse().with_context(|| format!("invalid PORT: {raw}"))?,
                    Err(_) => 8080,
                };
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let base_port = match std::env::var("SWARM_BASE_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid SWARM_BASE_PORT: {raw}"))?,
            Err(_) => 18001,
        };

        let gateway_bin =
            std::env::var("SWARM_GATEWAY_BIN").unwrap_or_else(|_| "buddygw".to_string());

        let stop_grace_secs = match std::env::var("SWARM_STOP_GRACE_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid SWARM_STOP_GRACE_SECS: {raw}"))?,
            Err(_) => 10,
        };

        let registry_url = std::env::var("SWARM_REGISTRY_URL").ok().filter(|s| !s.is_empty());
        let registry_key = std::env::var("SWARM_REGISTRY_KEY").ok().filter(|s| !s.is_empty());

        let log_level = std::env::var("SWARM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            bots_dir,
            listen_addr,
            base_port,
            gateway_bin,
            stop_grace: Duration::from_secs(stop_grace_secs),
            registry_url,
            registry_key,
            log_level,
        })
    }
}
