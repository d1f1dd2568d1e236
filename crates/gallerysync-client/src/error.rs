//! Client error types.

use thiserror::Error;

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The caller may not read this path.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other store-side failure.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Errors surfaced to feed consumers and reconnect callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A subscription failed while the host was online; backoff will retry.
    #[error("transient connectivity error: {0}")]
    TransientConnectivity(#[source] StoreError),

    /// A subscription failed for a reason retrying will not fix.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// The host reports no network.
    #[error("host is offline")]
    Offline,

    /// Backoff gave up.
    #[error("gave up reconnecting after {attempts} attempts")]
    ExhaustedRetries {
        /// Consecutive failed attempts.
        attempts: u32,
    },

    /// One pushed snapshot could not be translated; the subscription stays open.
    #[error(transparent)]
    MalformedSnapshot(#[from] gallerysync_core::Error),
}

impl Error {
    /// Classify a store failure.
    pub fn from_store(err: StoreError) -> Self {
        if err.is_transient() {
            Error::TransientConnectivity(err)
        } else {
            Error::Store(err)
        }
    }

    /// Whether the reconnect loop will keep trying after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientConnectivity(_) | Error::Offline)
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::from_store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification() {
        let transient = Error::from_store(StoreError::Unavailable("reset".into()));
        assert!(matches!(transient, Error::TransientConnectivity(_)));
        assert!(transient.is_retryable());

        let fatal: Error = StoreError::PermissionDenied("images".into()).into();
        assert!(matches!(fatal, Error::Store(_)));
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::ExhaustedRetries { attempts: 5 };
        assert_eq!(err.to_string(), "gave up reconnecting after 5 attempts");

        let malformed: Error = gallerysync_core::Error::malformed("tags", "missing name").into();
        assert_eq!(malformed.to_string(), "malformed snapshot for feed tags: missing name");
    }
}
