//! Performance counters for the sync layer.
//!
//! # Usage
//!
//! ```ignore
//! use gallerysync_core::metrics::new_shared_counters;
//! use std::time::Duration;
//!
//! let counters = new_shared_counters();
//!
//! // A snapshot arrived 120ms after the subscribe call
//! counters.record_outcome(false, Some(Duration::from_millis(120)));
//!
//! // A cache-first read found nothing
//! counters.record_cache_miss();
//!
//! let snapshot = counters.snapshot();
//! println!("{}", counters.to_prometheus());
//! ```

mod counters;
mod histogram;

pub use counters::{
    new_shared_counters, PerformanceCounters, PerformanceMetrics, SharedPerformanceCounters,
};
pub use histogram::Histogram;
