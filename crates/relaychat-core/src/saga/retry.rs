//! Stateless retry policy for saga notification steps.

use std::time::Duration;

/// Default pause before the first re-attempt.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-attempts allowed per recipient. 0 disables retrying.
    pub max_retries: u32,
    /// Base delay; the n-th re-attempt waits `n * backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether another attempt is allowed after `attempts_made` re-attempts.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_retries
    }

    /// Delay before re-attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
