//! Retry with exponential backoff for Authority calls.
//!
//! Only errors whose [`ErrorKind`](dte_core::ErrorKind) is retryable
//! (transport failures and timeouts) are retried. Everything else returns
//! immediately.

use std::future::Future;
use std::time::Duration;

use crate::config::AuthorityConfig;
use crate::error::AuthorityError;

/// Bounded attempt count and the first backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Policy from the client configuration.
    pub fn from_config(config: &AuthorityConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_backoff_ms),
        }
    }

    /// Delay before attempt `attempt + 1` (1-based `attempt`): 200ms, 400ms, 800ms, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Result of a retried call: the final result plus the attempts spent.
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T, AuthorityError>,
    pub attempts: u32,
}

/// Call `f` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is reached.
pub async fn retry_transport<T, F, Fut>(policy: RetryPolicy, operation: &str, f: F) -> Retried<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, AuthorityError>>,
{
    let mut attempt = 1;
    loop {
        match f(attempt).await {
            Ok(value) => {
                return Retried {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) if e.kind().is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "authority call failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Retried {
                    result: Err(e),
                    attempts: attempt,
                }
            }
        }
    }
}
