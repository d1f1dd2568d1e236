//! gallerysync client - live feed subscriptions over a remote document store.
//!
//! The [`ListenerManager`] multiplexes deduplicated push subscriptions to the
//! image, single-image, tag, and tag-group feeds. It serves cached snapshots
//! before the network answers, follows the host's connectivity through a
//! [`NetworkMonitor`], and recovers dropped subscriptions with bounded
//! exponential backoff while publishing a single [`ConnectionStatus`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gallerysync_client::{
//!     ListenerManager, MemoryStore, NetworkMonitor, SubscribeOptions, SyncConfig,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let manager = ListenerManager::new(store, NetworkMonitor::default(), SyncConfig::default());
//!
//! let _status = manager.on_connection_status_change(|status| println!("status: {status}"));
//! let tags = manager
//!     .subscribe_to_tags(|tags| println!("{} tags", tags.len()), None, SubscribeOptions::default())
//!     .await;
//!
//! tags.unsubscribe();
//! ```

pub mod backoff;
pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod manager;
pub mod memory;
pub mod network;
pub mod registry;
pub mod store;

pub use backoff::{Backoff, BackoffStep};
pub use config::{ReconnectPolicy, SyncConfig};
pub use context::SyncContext;
pub use error::{Error, StoreError};
pub use feed::{FeedKind, FeedTarget, FeedValue};
pub use manager::{
    ErrorCallback, ListenerManager, SharedListenerManager, SubscribeOptions, Unsubscribe,
    UpdateCallback,
};
pub use memory::MemoryStore;
pub use network::NetworkMonitor;
pub use registry::SubscriptionRegistry;
pub use store::{
    DocumentStore, OrderDirection, OrderSpec, RawDocument, RawSnapshot, SharedDocumentStore,
    StoreSubscription,
};

pub use gallerysync_core::{
    normalize_timestamp, CachedSnapshot, ConnectionStatus, ImageRecord, PerformanceMetrics,
    StatusSubscription, TagGroupRecord, TagRecord,
};
