//! Swarm manager entry point.
//!
//! Boot order: load config, open the store, pick the registry client
//! (no-op when credentials are absent), autostart the fleet, then serve
//! the HTTP API. A termination signal drains the fleet sequentially and
//! exits; drain errors are logged, never allowed to hang shutdown.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use swarm_manager::{
    api, config::Config, sequencer, state::AppState, store::BotStore, supervisor::Supervisor,
};
use swarm_registry::{HttpRegistry, NoopRegistry, Registry};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to SWARM_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting swarm manager");
    info!(
        bots_dir = %config.bots_dir.display(),
        listen_addr = %config.listen_addr,
        base_port = config.base_port,
        gateway_bin = %config.gateway_bin,
        "Configuration loaded"
    );

    let store = Arc::new(BotStore::open(&config.bots_dir, config.base_port).await?);

    // The registry is advisory: without credentials, lifecycle operations
    // still work against a no-op client.
    let registry: Arc<dyn Registry> = match (&config.registry_url, &config.registry_key) {
        (Some(url), Some(key)) => {
            info!(registry_url = %url, "Registry sync enabled");
            Arc::new(HttpRegistry::new(url.clone(), key.clone()))
        }
        _ => {
            info!("No registry credentials, running without registry sync");
            Arc::new(NoopRegistry)
        }
    };

    let supervisor = Arc::new(Supervisor::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        config.gateway_bin.clone(),
        config.stop_grace,
    ));

    let started = sequencer::autostart_all(&store, &supervisor).await;
    info!(started, "Autostart sweep complete");

    let state = AppState::new(Arc::clone(&store), Arc::clone(&supervisor), registry);
    let app = api::create_router(state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    supervisor.shutdown_all().await;
    info!("Swarm manager shutdown complete");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
