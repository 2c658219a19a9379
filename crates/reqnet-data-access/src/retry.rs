//! Bounded exponential backoff around collaborator calls

use crate::config::RetryConfig;
use crate::error::CollaboratorError;
use crate::metrics::Metrics;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Largest backoff exponent
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Outcome of a retried call that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Cancelled before an attempt or during a backoff sleep
    Cancelled,
    /// Every attempt failed with a retryable error
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Last failure
        last: CollaboratorError,
    },
    /// A non-retryable failure
    Fatal(CollaboratorError),
}

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Create from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// Attempts made before giving up
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after the `failures`-th consecutive failure (starting at 1)
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        if self.jitter && !delay.is_zero() {
            // Between half and the full delay
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Run `call` until it succeeds, fails permanently, runs out of
    /// attempts or `cancel` fires.
    ///
    /// Each attempt is bounded by `timeout`; an elapsed timeout counts as a
    /// connection failure. Cancellation is observed before each attempt and
    /// during backoff sleeps, never in the middle of an attempt.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        timeout: Duration,
        cancel: &CancellationToken,
        metrics: &Metrics,
        mut call: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempt += 1;

            let result = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(CollaboratorError::connection(format!(
                    "{} timed out after {:?}",
                    operation, timeout
                ))),
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                debug!(operation, attempt, error = %error, "Permanent failure");
                return Err(RetryError::Fatal(error));
            }
            if attempt >= max_attempts {
                warn!(operation, attempts = attempt, error = %error, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.backoff(attempt);
            warn!(operation, attempt, error = %error, delay_ms = delay.as_millis() as u64, "Retrying");
            metrics.counter(&format!("{}.retries", operation), 1);

            tokio::select! {
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
