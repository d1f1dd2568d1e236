//! Fixed-bucket histogram for delivery latency.

use std::sync::atomic::{AtomicU64, Ordering};

/// Bucket upper bounds in milliseconds.
const RESPONSE_TIME_BUCKETS_MS: [u64; 11] =
    [5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000];

/// Fixed-bucket histogram of response times.
///
/// Each observation is counted in the first bucket whose bound is at least
/// the value; values past the last bound land in the last bucket.
pub struct Histogram {
    buckets: Vec<u64>,
    counts: Vec<AtomicU64>,
    count: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Histogram with the default response-time buckets (5ms .. 10s).
    pub fn response_time() -> Self {
        Self::with_buckets(RESPONSE_TIME_BUCKETS_MS.to_vec())
    }

    /// Histogram with custom, ascending bucket bounds.
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Record a value in milliseconds.
    pub fn observe(&self, value_ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value_ms, Ordering::Relaxed);

        let index = self
            .buckets
            .iter()
            .position(|&bound| value_ms <= bound)
            .unwrap_or(self.buckets.len().saturating_sub(1));
        if let Some(count) = self.counts.get(index) {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Largest observed value.
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Approximate percentile, e.g. 0.99 for P99.
    ///
    /// Returns the upper bound of the bucket holding the target rank.
    pub fn percentile(&self, p: f64) -> u64 {
        let total = self.count();
        if total == 0 {
            return 0;
        }

        let target = ((total as f64) * p).ceil().max(1.0) as u64;
        let mut cumulative = 0u64;
        for (bound, count) in self.buckets.iter().zip(&self.counts) {
            cumulative += count.load(Ordering::Relaxed);
            if cumulative >= target {
                return *bound;
            }
        }
        self.buckets.last().copied().unwrap_or(0)
    }

    /// Median.
    pub fn p50(&self) -> u64 {
        self.percentile(0.50)
    }

    /// 99th percentile.
    pub fn p99(&self) -> u64 {
        self.percentile(0.99)
    }

    /// Zero every bucket.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }

    /// `(bound, count)` per bucket.
    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        self.buckets
            .iter()
            .zip(&self.counts)
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::response_time()
    }
}
