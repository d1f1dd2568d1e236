//! Core error types.

use thiserror::Error;

/// Core errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A pushed snapshot could not be translated into the feed's record shape.
    #[error("malformed snapshot for feed {feed}: {reason}")]
    MalformedSnapshot {
        /// Feed the snapshot was delivered on.
        feed: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A timestamp-like field had no recognised representation.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl Error {
    /// Build a malformed-snapshot error.
    pub fn malformed(feed: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            feed: feed.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
