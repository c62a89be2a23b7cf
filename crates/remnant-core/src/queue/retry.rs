//! Retry policy: decides how far a failed job is pushed back.

use std::time::Duration;

/// Retry policy for failed queue jobs.
///
/// The job's `fail_delay` is the state: the first failure waits `base_delay`,
/// every later one multiplies the previous delay, up to `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub base_delay: Duration,

    /// Backoff multiplier applied to the previous delay.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy the external task queue applies: 60s, doubling, capped at a day.
    pub fn standard() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_delay: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Delay to apply after a failure, given the delay the job already had.
    ///
    /// Example with the standard policy:
    /// - 0s (never failed) -> 60s
    /// - 60s -> 120s
    /// - 120s -> 240s
    /// - ... -> 86400s
    pub fn next_delay(&self, previous: Duration) -> Duration {
        let next = if previous.is_zero() {
            self.base_delay
        } else {
            Duration::from_secs_f64(previous.as_secs_f64() * self.multiplier).max(self.base_delay)
        };
        next.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}
