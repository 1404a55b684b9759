//! Bounded exponential backoff for registry calls.
//!
//! [`RetryPolicy::run`] re-invokes an operation while its result reports a
//! transient failure, sleeping between attempts. It never changes the
//! result type: after the last attempt the final failure is returned as is.

use crate::error::{Result, RetagError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests;

/// Results that the retry policy knows how to inspect.
pub trait Retryable {
    /// True when another attempt may succeed.
    fn is_transient(&self) -> bool;

    /// Minimum wait requested by the server before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// The value produced when the caller cancels the operation.
    fn cancelled() -> Self;
}

impl<T> Retryable for Result<T> {
    fn is_transient(&self) -> bool {
        matches!(self, Err(e) if e.is_transient())
    }

    fn retry_after(&self) -> Option<Duration> {
        self.as_ref().err().and_then(RetagError::retry_after)
    }

    fn cancelled() -> Self {
        Err(RetagError::Cancelled)
    }
}

/// Retry configuration: attempt cap, base delay and delay ceiling.
///
/// # Examples
///
/// ```
/// use libretag::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(4, Duration::from_millis(100), Duration::from_millis(250));
/// assert_eq!(policy.delay_for(0), Duration::from_millis(100));
/// assert_eq!(policy.delay_for(1), Duration::from_millis(200));
/// assert_eq!(policy.delay_for(2), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(500), Duration::from_secs(8))
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one, and the
    /// ceiling is never allowed below the base delay.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Returns the total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (zero-based): `base * 2^retry`,
    /// capped at the ceiling.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the attempt
    /// cap is reached.
    ///
    /// The closure receives the one-based attempt number. Cancelling `cancel`
    /// aborts both the in-flight attempt and any pending backoff sleep, and
    /// yields [`Retryable::cancelled`].
    pub async fn run<T, F, Fut>(&self, operation: &str, cancel: &CancellationToken, mut f: F) -> T
    where
        T: Retryable,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut previous_delay = Duration::ZERO;
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return T::cancelled();
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return T::cancelled(),
                result = f(attempt) => result,
            };

            if !result.is_transient() || attempt >= self.max_attempts {
                if attempt > 1 && result.is_transient() {
                    tracing::warn!(
                        operation,
                        attempts = attempt,
                        "giving up after exhausting retry attempts"
                    );
                }
                return result;
            }

            // Delays never shrink, even when a server hint raised the last one.
            let delay = self
                .delay_for(attempt - 1)
                .max(result.retry_after().unwrap_or_default())
                .max(previous_delay)
                .min(self.max_delay);
            previous_delay = delay;

            tracing::warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "transient registry failure, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return T::cancelled(),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
