//! Boot-time fleet sequencing.
//!
//! Brings the fleet to its desired running state before the HTTP listener
//! comes up. One bot failing to start must never abort the sweep or keep
//! the API down, so every failure here is logged and skipped.

use tracing::{info, warn};

use crate::store::BotStore;
use crate::supervisor::Supervisor;

/// Start every stored bot whose record does not opt out of autostart.
///
/// Returns the number of bots started.
pub async fn autostart_all(store: &BotStore, supervisor: &Supervisor) -> usize {
    let ids = match store.list().await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "Failed to enumerate bots, skipping autostart");
            return 0;
        }
    };

    info!(count = ids.len(), "Found registered bots");

    let mut started = 0;
    for id in ids {
        let record = match store.read(&id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(bot_id = %id, error = %e, "Skipping bot with unreadable record");
                continue;
            }
        };

        if !record.config.autostart {
            info!(bot_id = %id, "Autostart disabled, skipping");
            continue;
        }

        match supervisor.start(&id).await {
            Ok(port) => {
                started += 1;
                info!(bot_id = %id, port, "Bot started");
            }
            Err(e) => {
                warn!(bot_id = %id, error = %e, "Failed to start bot");
            }
        }
    }

    started
}
