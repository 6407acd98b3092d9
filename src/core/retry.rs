//! Retry and backoff helpers shared by the dependency resolver and the
//! real-time client.

use std::future::Future;
use std::time::Duration;

/// Fixed-delay retry policy
///
/// `retries` counts *additional* attempts, so `retries = 3` allows up to four
/// attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn total_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// True if `attempt` (zero-based) is the last one the policy allows
    pub fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt >= self.retries
    }
}

/// `base * 2^(attempt - 1)` for a one-based attempt number, saturating
pub fn exponential_backoff(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent)
}

/// Race `operation` against a timer.
///
/// When the timer wins the operation future is dropped, which cancels it at
/// its next suspension point. Work it spawned on its own keeps running.
pub async fn race_timeout<T, E, Fut>(
    limit: Duration,
    operation: Fut,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
