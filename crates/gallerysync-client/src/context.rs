//! Shared state handed to the listener manager at startup.

use std::sync::Arc;

use gallerysync_core::{
    new_shared_counters, CachedSnapshot, SharedPerformanceCounters, SharedStatusPublisher,
    SharedTtlCache, StatusPublisher, TtlCache,
};

use crate::config::SyncConfig;

/// The cache, counters, and status publisher every feed shares.
///
/// Built once by the application and injected into the manager, so tests
/// can construct a fresh context instead of touching process-wide state.
#[derive(Clone)]
pub struct SyncContext {
    pub cache: SharedTtlCache<CachedSnapshot>,
    pub counters: SharedPerformanceCounters,
    pub status: SharedStatusPublisher,
}

impl SyncContext {
    /// Create a context whose cache uses the configured default TTL.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            cache: Arc::new(TtlCache::new(config.default_cache_ttl)),
            counters: new_shared_counters(),
            status: Arc::new(StatusPublisher::new()),
        }
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}
