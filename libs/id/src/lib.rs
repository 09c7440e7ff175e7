//! # swarm-id
//!
//! Bot identifier parsing and validation for the buddy swarm.
//!
//! Unlike system-generated resource IDs, a [`BotId`] is chosen by the caller
//! at creation time and doubles as the bot's directory name on disk and its
//! key in the supervisor's process table. Parsing therefore enforces
//! path-safety rules, not just a format:
//!
//! - lowercase ASCII letters, digits, `-`, and `_` only
//! - must start with a letter or digit
//! - at most 64 characters
//!
//! This rules out separators (`/`, `\`), relative components (`.`, `..`),
//! and anything else that could escape the bots directory.

mod error;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use error::IdError;

/// Maximum length of a bot ID in characters.
pub const MAX_LEN: usize = 64;

/// A validated bot identifier.
///
/// Stable for the bot's lifetime; ordering is lexicographic, which gives
/// the directory store its reproducible listing order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BotId(String);

impl BotId {
    /// Parse and validate a bot ID.
    pub fn parse(input: &str) -> Result<Self, IdError> {
        if input.is_empty() {
            return Err(IdError::Empty);
        }
        if input.len() > MAX_LEN {
            return Err(IdError::TooLong {
                len: input.len(),
                max: MAX_LEN,
            });
        }

        let mut chars = input.chars();
        let first = chars.next().unwrap_or_default();
        if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
            return Err(IdError::InvalidStart(first));
        }
        for c in chars {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
                return Err(IdError::InvalidChar(c));
            }
        }

        Ok(Self(input.to_string()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BotId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for BotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for BotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
