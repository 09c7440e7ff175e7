//! Error types for registry operations.

use thiserror::Error;

/// Errors returned by registry operations.
///
/// Callers on the lifecycle path treat these as advisory (log and move on);
/// only the catalog append surfaces them to the end user.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The HTTP request itself failed (connect, timeout, decode).
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered with a non-success status.
    #[error("registry returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The registry answered with a body we could not interpret.
    #[error("unexpected registry response: {0}")]
    UnexpectedResponse(String),
}
