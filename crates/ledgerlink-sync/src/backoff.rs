//! Reconnection backoff policy.
//!
//! Delays grow exponentially per failed attempt. Once `max_retries`
//! retries have been spent the policy stops scheduling; only an explicit
//! `connect()` call (which resets the counter) starts a new budget.

use std::time::Duration;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_retries: u32,
}

impl ReconnectPolicy {
    /// Create a policy with the given base delay and retry budget.
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_retries,
        }
    }

    /// Delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Number of retries scheduled before giving up.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        self.base_delay.saturating_mul(1u32 << shift)
    }

    /// Decide the next retry after a failure.
    ///
    /// `retry_count` is how many retries have already been scheduled.
    /// Returns `None` once the budget is spent.
    pub fn next_delay(&self, retry_count: u32) -> Option<Duration> {
        if retry_count >= self.max_retries {
            None
        } else {
            Some(self.delay_for(retry_count + 1))
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 5)
    }
}
