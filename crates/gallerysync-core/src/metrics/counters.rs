//! Aggregate request, error, latency and cache counters.
//!
//! These are observability-only: nothing in the sync path branches on them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::histogram::Histogram;

/// Point-in-time copy of the performance counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Deliveries and failures recorded so far.
    pub total_requests: u64,
    /// How many of those were errors.
    pub error_count: u64,
    /// Running mean of reported response times, in milliseconds.
    pub average_response_time: f64,
    /// Cache-first reads that found a value.
    pub cache_hits: u64,
    /// Cache-first reads that found nothing.
    pub cache_misses: u64,
    /// Time of the last mutation.
    pub last_updated: DateTime<Utc>,
}

impl PerformanceMetrics {
    fn new() -> Self {
        Self {
            total_requests: 0,
            error_count: 0,
            average_response_time: 0.0,
            cache_hits: 0,
            cache_misses: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Shared, monotonically updated performance counters.
pub struct PerformanceCounters {
    metrics: Mutex<PerformanceMetrics>,
    response_times: Histogram,
}

impl PerformanceCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(PerformanceMetrics::new()),
            response_times: Histogram::response_time(),
        }
    }

    /// Record the outcome of one delivery or failure.
    ///
    /// When `elapsed` is given it is folded into the running mean using the
    /// post-increment request count.
    pub fn record_outcome(&self, is_error: bool, elapsed: Option<Duration>) {
        let mut metrics = self.metrics.lock();
        metrics.total_requests += 1;
        if is_error {
            metrics.error_count += 1;
        }

        if let Some(elapsed) = elapsed {
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            let n = metrics.total_requests as f64;
            metrics.average_response_time =
                (metrics.average_response_time * (n - 1.0) + elapsed_ms) / n;
            self.response_times.observe(elapsed.as_millis() as u64);
        }

        metrics.last_updated = Utc::now();
    }

    /// Record a cache hit.
    pub fn record_cache_hit(&self) {
        let mut metrics = self.metrics.lock();
        metrics.cache_hits += 1;
        metrics.last_updated = Utc::now();
    }

    /// Record a cache miss.
    pub fn record_cache_miss(&self) {
        let mut metrics = self.metrics.lock();
        metrics.cache_misses += 1;
        metrics.last_updated = Utc::now();
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> PerformanceMetrics {
        self.metrics.lock().clone()
    }

    /// Fraction of requests that were errors (0.0 - 1.0).
    pub fn error_rate(&self) -> f64 {
        let metrics = self.metrics.lock();
        if metrics.total_requests == 0 {
            return 0.0;
        }
        metrics.error_count as f64 / metrics.total_requests as f64
    }

    /// Get cache hit rate (0.0 - 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        let metrics = self.metrics.lock();
        let total = metrics.cache_hits + metrics.cache_misses;
        if total == 0 {
            return 0.0;
        }
        metrics.cache_hits as f64 / total as f64
    }

    /// P50 response time in milliseconds (bucket bound).
    pub fn p50_response_time_ms(&self) -> u64 {
        self.response_times.p50()
    }

    /// P99 response time in milliseconds (bucket bound).
    pub fn p99_response_time_ms(&self) -> u64 {
        self.response_times.p99()
    }

    /// Slowest response time seen, in milliseconds.
    pub fn max_response_time_ms(&self) -> u64 {
        self.response_times.max()
    }

    /// Zero every counter.
    pub fn reset(&self) {
        *self.metrics.lock() = PerformanceMetrics::new();
        self.response_times.reset();
    }

    /// Export to Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let metrics = self.snapshot();
        let mut out = String::new();

        out.push_str("# HELP gallerysync_requests_total Snapshot deliveries and failures\n");
        out.push_str("# TYPE gallerysync_requests_total counter\n");
        out.push_str(&format!("gallerysync_requests_total {}\n\n", metrics.total_requests));

        out.push_str("# HELP gallerysync_errors_total Subscription and snapshot errors\n");
        out.push_str("# TYPE gallerysync_errors_total counter\n");
        out.push_str(&format!("gallerysync_errors_total {}\n\n", metrics.error_count));

        out.push_str("# HELP gallerysync_response_time_ms_avg Average response time in milliseconds\n");
        out.push_str("# TYPE gallerysync_response_time_ms_avg gauge\n");
        out.push_str(&format!(
            "gallerysync_response_time_ms_avg {:.3}\n\n",
            metrics.average_response_time
        ));

        out.push_str("# HELP gallerysync_response_time_ms_p99 P99 response time in milliseconds\n");
        out.push_str("# TYPE gallerysync_response_time_ms_p99 gauge\n");
        out.push_str(&format!(
            "gallerysync_response_time_ms_p99 {}\n\n",
            self.p99_response_time_ms()
        ));

        out.push_str("# HELP gallerysync_cache_hits_total Feed cache hits\n");
        out.push_str("# TYPE gallerysync_cache_hits_total counter\n");
        out.push_str(&format!("gallerysync_cache_hits_total {}\n\n", metrics.cache_hits));

        out.push_str("# HELP gallerysync_cache_misses_total Feed cache misses\n");
        out.push_str("# TYPE gallerysync_cache_misses_total counter\n");
        out.push_str(&format!("gallerysync_cache_misses_total {}\n", metrics.cache_misses));

        out
    }
}

impl Default for PerformanceCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared counters handle.
pub type SharedPerformanceCounters = Arc<PerformanceCounters>;

/// Create new shared counters.
pub fn new_shared_counters() -> SharedPerformanceCounters {
    Arc::new(PerformanceCounters::new())
}
