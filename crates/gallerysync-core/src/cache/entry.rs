//! Cache entry with an expiry deadline.

use std::time::Duration;

use tokio::time::Instant;

/// A cached value together with when it was stored and how long it lives.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub data: T,
    /// When the value was written.
    pub stored_at: Instant,
    /// How long the value stays valid after `stored_at`.
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Create an entry stored now.
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Check whether the entry has outlived its TTL at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }

    /// Check whether the entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.stored_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiry() {
        let entry = CacheEntry::new("value", Duration::from_millis(10));
        assert!(!entry.is_expired());
        assert_eq!(entry.remaining(), Duration::from_millis(10));

        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired());
        assert_eq!(entry.remaining(), Duration::ZERO);
    }
}
