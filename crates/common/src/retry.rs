//! Bounded retry with exponential backoff.
//!
//! The policy is plain data and the delay schedule is a pure function of the
//! attempt number. Sleeping goes through the [`Sleeper`] trait so tests can
//! record the requested delays instead of waiting on the clock.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

/// Retry parameters for an external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Factor applied to the delay after each further failure
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(initial_delay_ms),
            multiplier: 2,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `initial_delay * multiplier^(attempt - 1)`. No jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Source of backoff sleeps.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Outcome of a retried operation that never succeeded.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    /// Error from the final attempt
    pub last_error: E,
}

/// Run `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// `operation` receives the 1-based attempt number. Between attempts the
/// sleeper is asked for `policy.backoff_delay(attempt)`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let delay = policy.backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
        }
    }
}
