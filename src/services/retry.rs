use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{AppError, AppResult};

/// Exponential backoff with jitter, shared by every source adapter.
///
/// Attempts run sequentially; each attempt's result fully replaces the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay that may be added or removed at random, 0.0..=1.0
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay after the given failed attempt (1-based):
    /// `min(max_delay, base_delay * 2^(attempt-1))`
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay after `attempt`, perturbed by `±delay * jitter_factor * unit`.
    ///
    /// `unit` is a random sample from `[0, 1)`; it is mapped onto `[-1, 1)` so the
    /// perturbation can shorten or lengthen the wait. The result is never negative.
    pub fn jittered_delay(&self, attempt: u32, unit: f64) -> Duration {
        let delay = self.base_delay_for(attempt).as_secs_f64();
        let jitter = self.jitter_factor.clamp(0.0, 1.0);
        let offset = delay * jitter * (unit.clamp(0.0, 1.0) * 2.0 - 1.0);
        Duration::from_secs_f64((delay + offset).max(0.0))
    }

    /// Runs `operation` until it succeeds, a non-retryable error occurs,
    /// or `max_attempts` failures have been seen.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                tracing::warn!(source = label, attempt, error = %error, "Non-retryable failure");
                return Err(error);
            }

            if attempt >= max_attempts {
                tracing::error!(
                    source = label,
                    attempts = attempt,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(AppError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let delay = self.jittered_delay(attempt, rand::rng().random::<f64>());
            let throttled = matches!(error, AppError::Throttled(_));

            tracing::warn!(
                source = label,
                attempt,
                max_attempts,
                throttled,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, backing off"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
