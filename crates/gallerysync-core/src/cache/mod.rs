//! TTL cache used for instant first paint of feeds.
//!
//! The cache serves the last known snapshot of a feed synchronously,
//! independent of how long the remote store takes to push a fresh one.

mod entry;
mod ttl;

pub use entry::CacheEntry;
pub use ttl::{CacheStats, SharedTtlCache, TtlCache, DEFAULT_CACHE_TTL, DEFAULT_SWEEP_INTERVAL};
