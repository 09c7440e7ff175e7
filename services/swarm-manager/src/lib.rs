//! Swarm manager: bot fleet lifecycle orchestrator.
//!
//! Tracks a fleet of buddy gateway processes on one host. Each bot owns a
//! directory under the bots root (config, workspace, gateway state); the
//! supervisor owns the id-to-process mapping; an HTTP surface drives
//! create/start/stop/delete; and a remote registry mirrors fleet metadata
//! on a best-effort basis.
//!
//! ## Architecture
//!
//! - **Store**: durable per-bot configuration and workspace on disk
//! - **Supervisor**: spawns, signals, and reaps gateway processes
//! - **API**: axum handlers translating HTTP calls into the above
//! - **Sequencer**: boot-time autostart sweep
//! - **Registry**: advisory metadata sync, never on the lifecycle path

pub mod api;
pub mod config;
pub mod sequencer;
pub mod state;
pub mod store;
pub mod supervisor;
