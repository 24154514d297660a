//! Retry policy and backoff.

use std::time::Duration;

use crate::config::ClientConfig;
use crate::models::RequestOptions;

/// Retry budget and exponential backoff for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry.
    pub retry_delay: Duration,
    /// Upper bound on a single delay.
    pub max_retry_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Request options override the client defaults field by field.
    pub fn resolve(config: &ClientConfig, options: &RequestOptions) -> Self {
        Self {
            retries: options.retries.unwrap_or(config.retries),
            retry_delay: options.retry_delay.unwrap_or(config.retry_delay),
            max_retry_delay: options.max_retry_delay.or(config.max_retry_delay),
        }
    }

    /// Total attempts allowed, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay after the failed attempt `attempt` (0-indexed): `retry_delay * 2^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.retry_delay.saturating_mul(factor);
        match self.max_retry_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
