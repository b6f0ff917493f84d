//! Bounded retry with quadratic backoff for outer chunks.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retries an operation up to `max_attempts` times.
///
/// Attempt `n` (zero-based, `n > 0`) is preceded by a sleep of
/// `n² × backoff_unit`, raced against cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryController {
    max_attempts: u32,
    backoff_unit: Duration,
}

impl RetryController {
    /// Creates a controller. `max_attempts` of zero is treated as one.
    #[must_use]
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Total attempts this controller makes before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before zero-based attempt `attempt`.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt.saturating_mul(attempt))
    }

    /// Runs `op` until it succeeds, attempts run out, or `cancel` fires.
    ///
    /// `op` receives the zero-based attempt number. A cancellation error from
    /// `op` is returned as-is without further attempts.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fires during a backoff sleep, or
    ///   `op` itself reports cancellation.
    /// - [`Error::RetriesExhausted`] wrapping the last failure otherwise.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff_for(attempt);
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::info!(attempt, "Cancelled during retry backoff");
                        return Err(Error::Cancelled);
                    }
                    () = tokio::time::sleep(delay) => {
                        tracing::info!(attempt, delay_ms = delay.as_millis(), "Retrying after backoff");
                    }
                }
                metrics::counter!("docforge_retries_total").increment(1);
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt failed"
                    );
                    last_error = Some(e);
                },
            }
        }

        Err(Error::RetriesExhausted {
            attempts: self.max_attempts,
            source: Box::new(last_error.unwrap_or(Error::Cancelled)),
        })
    }
}
