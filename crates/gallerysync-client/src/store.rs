//! Remote document store boundary.
//!
//! The sync layer never talks to a database directly. It opens push
//! subscriptions through [`DocumentStore`] and receives full snapshots on
//! callbacks until the returned [`StoreSubscription`] is cancelled.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gallerysync_core::RawDocument;

use crate::error::StoreError;

/// Sort direction for collection snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Ordering applied by the store to a collection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: String,
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Ascending by `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Descending by `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// A pushed snapshot before translation into feed records.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSnapshot {
    /// Every document of a collection, in store order.
    Collection(Vec<RawDocument>),
    /// A single document, `None` if it does not exist.
    Document(Option<RawDocument>),
}

/// Receives collection snapshots.
pub type CollectionCallback = Arc<dyn Fn(Vec<RawDocument>) + Send + Sync>;

/// Receives single-document snapshots.
pub type DocumentCallback = Arc<dyn Fn(Option<RawDocument>) + Send + Sync>;

/// Receives subscription failures.
pub type StoreErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync>;

/// Cancel handle for one open store subscription.
///
/// Cancelling is idempotent, and dropping the handle cancels it.
pub struct StoreSubscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl StoreSubscription {
    /// Wrap a store-specific cancel function.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Stop the subscription.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for StoreSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSubscription")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

/// A document store that pushes snapshots to subscribers.
///
/// Implementations deliver the current state once the subscription is open
/// and again after every change, in push order. Callbacks must not be
/// invoked while the store holds a lock the cancel function also takes, so
/// that consumers can cancel from inside a callback.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Watch every document in the collection at `path`, sorted by `order`.
    async fn subscribe_collection(
        &self,
        path: &str,
        order: OrderSpec,
        on_snapshot: CollectionCallback,
        on_error: StoreErrorCallback,
    ) -> Result<StoreSubscription, StoreError>;

    /// Watch the single document at `path` (`<collection>/<id>`).
    async fn subscribe_document(
        &self,
        path: &str,
        on_snapshot: DocumentCallback,
        on_error: StoreErrorCallback,
    ) -> Result<StoreSubscription, StoreError>;
}

/// Shared store handle.
pub type SharedDocumentStore = Arc<dyn DocumentStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cancel_runs_once() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cancels);
        let subscription = StoreSubscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.cancel();

        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_cancels() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cancels);
        {
            let _subscription = StoreSubscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(cancels.load(Ordering::SeqCst), 1);

        StoreSubscription::noop().cancel();
    }

    #[test]
    fn test_order_spec() {
        let order = OrderSpec::desc("createdAt");
        assert_eq!(order.field, "createdAt");
        assert_eq!(order.direction, OrderDirection::Desc);
        assert_eq!(OrderSpec::asc("name").direction, OrderDirection::Asc);
    }
}
