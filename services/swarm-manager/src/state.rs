//! Application state shared across request handlers.

use std::sync::Arc;

use swarm_registry::Registry;

use crate::store::BotStore;
use crate::supervisor::Supervisor;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<BotStore>,
    supervisor: Arc<Supervisor>,
    registry: Arc<dyn Registry>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        store: Arc<BotStore>,
        supervisor: Arc<Supervisor>,
        registry: Arc<dyn Registry>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                supervisor,
                registry,
            }),
        }
    }

    /// Get a reference to the bot directory store.
    pub fn store(&self) -> &BotStore {
        &self.inner.store
    }

    /// Get a reference to the process supervisor.
    pub fn supervisor(&self) -> &Supervisor {
        &self.inner.supervisor
    }

    /// Get a handle to the registry client.
    pub fn registry(&self) -> Arc<dyn Registry> {
        Arc::clone(&self.inner.registry)
    }
}
