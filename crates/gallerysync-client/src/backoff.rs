//! Bounded exponential backoff.

use std::time::Duration;

use crate::config::ReconnectPolicy;

/// Outcome of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Try again after `next_delay`.
    Retry { attempts: u32, next_delay: Duration },
    /// `max_attempts` reached; stop until reset.
    Exhausted { attempts: u32 },
}

/// Attempt counter and current delay of the reconnect loop.
///
/// The delay doubles after each failure; once `max_attempts` consecutive
/// failures are recorded the backoff stays exhausted until [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
    delay: Duration,
}

impl Backoff {
    /// Fresh backoff at the policy's initial delay.
    pub fn new(policy: ReconnectPolicy) -> Self {
        let delay = policy.initial_delay;
        Self {
            policy,
            attempts: 0,
            delay,
        }
    }

    /// Consecutive failures recorded since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait before the next attempt.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether no further attempts should be made.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Record a failed attempt and double the delay.
    pub fn record_failure(&mut self) -> BackoffStep {
        self.attempts = self.attempts.saturating_add(1);
        self.delay = self.delay.checked_mul(2).unwrap_or(Duration::MAX);

        if self.is_exhausted() {
            BackoffStep::Exhausted {
                attempts: self.attempts,
            }
        } else {
            BackoffStep::Retry {
                attempts: self.attempts,
                next_delay: self.delay,
            }
        }
    }

    /// Back to zero attempts and the initial delay.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.delay = self.policy.initial_delay;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
