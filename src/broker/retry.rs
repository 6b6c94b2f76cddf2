//! Bounded retry with exponential backoff
//!
//! Only errors that report [`BrokerError::is_retryable`] (rate limits and
//! timeouts) are retried. The delay before retry `n` (1-based) is
//! `base_delay * 2^(n-1)`, capped at `max_delay`.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use super::error::{BrokerError, BrokerResult};

/// Retry policy injected into the broker client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Set total attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set first backoff delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set backoff ceiling
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// A policy that retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `retry` (1-based): 1s, 2s, 4s, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> BrokerResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BrokerResult<T>>,
    {
        self.execute_if(operation, BrokerError::is_retryable).await
    }

    /// Like [`execute`](Self::execute), with a caller-chosen retry predicate.
    /// Non-idempotent writes use this to retry only on rate limits, where the
    /// broker is known not to have acted on the request.
    pub async fn execute_if<F, Fut, T, P>(&self, operation: F, should_retry: P) -> BrokerResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BrokerResult<T>>,
        P: Fn(&BrokerError) -> bool,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                tracing::debug!("Retrying after {}ms", delay.as_millis());
                sleep(delay).await;
            }

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if should_retry(&e) => {
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt + 1,
                        attempts,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(BrokerError::RetriesExhausted {
            attempts,
            last: Box::new(last_error.unwrap_or(BrokerError::RateLimited)),
        })
    }
}
