//! Retry policy: backoff delays and retry eligibility.

use std::time::Duration;

/// Retry policy for failed jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Whether permanent failures (e.g. unknown job type) consume the retry
    /// budget like any other failure instead of failing immediately.
    pub retry_permanent: bool,
}

impl Default for RetryPolicy {
    /// 1000 ms base, doubling, permanent failures are not retried.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_secs(3600),
            retry_permanent: false,
        }
    }
}

impl RetryPolicy {
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_retry_permanent(mut self, retry_permanent: bool) -> Self {
        self.retry_permanent = retry_permanent;
        self
    }

    /// Delay before the next attempt, given the attempt number that just failed
    /// (1-indexed): `base_delay * multiplier^(attempts - 1)`.
    ///
    /// With the default policy:
    /// - attempt 1 failed: 1s
    /// - attempt 2 failed: 2s
    /// - attempt 3 failed: 4s
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
