//! gallerysync core - building blocks of the real-time sync layer.
//!
//! This crate holds the pieces the listener manager wires together: the TTL
//! cache that gives feeds an instant first paint, the connection-status
//! publisher, the performance counters, and the feed record types with their
//! timestamp adapter.

pub mod cache;
pub mod error;
pub mod metrics;
pub mod record;
pub mod status;

pub use cache::{CacheEntry, CacheStats, SharedTtlCache, TtlCache};
pub use error::{Error, Result};
pub use metrics::{
    new_shared_counters, Histogram, PerformanceCounters, PerformanceMetrics,
    SharedPerformanceCounters,
};
pub use record::{
    normalize_timestamp, translate_collection, CachedSnapshot, FeedRecord, ImageRecord,
    RawDocument, TagGroupRecord, TagRecord,
};
pub use status::{ConnectionStatus, SharedStatusPublisher, StatusPublisher, StatusSubscription};
