//! Error types for bot ID parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating bot IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The ID string is empty.
    #[error("bot ID cannot be empty")]
    Empty,

    /// The ID exceeds the maximum length.
    #[error("bot ID too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    /// The ID contains a character outside the allowed set.
    #[error("bot ID contains invalid character {0:?} (allowed: a-z, 0-9, '-', '_')")]
    InvalidChar(char),

    /// The ID starts with a character that is not a letter or digit.
    #[error("bot ID must start with a lowercase letter or digit, got {0:?}")]
    InvalidStart(char),
}
