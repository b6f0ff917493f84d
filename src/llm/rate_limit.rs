//! Token-bucket rate limiting for hosted backends.

use crate::config::DEFAULT_RATE_LIMIT;
use crate::{Error, Result};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Token bucket admitting `per_minute` requests per minute with a burst of
/// the same size.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    capacity: f64,
    refill_every: Duration,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a limiter for `per_minute` requests per minute.
    ///
    /// Zero means unset and falls back to [`DEFAULT_RATE_LIMIT`].
    #[must_use]
    pub fn per_minute(per_minute: u32) -> Self {
        let per_minute = if per_minute == 0 {
            DEFAULT_RATE_LIMIT
        } else {
            per_minute
        };
        Self {
            bucket: Mutex::new(Bucket {
                tokens: f64::from(per_minute),
                last_refill: Instant::now(),
            }),
            capacity: f64::from(per_minute),
            refill_every: Duration::from_secs(60) / per_minute,
        }
    }

    /// Interval between token refills.
    #[must_use]
    pub const fn refill_interval(&self) -> Duration {
        self.refill_every
    }

    /// Waits until a token is available, then consumes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let Some(wait) = self.try_take() else {
                return Ok(());
            };
            tracing::debug!(wait_ms = wait.as_millis(), "Rate limiter waiting for token");
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(wait) => {},
            }
        }
    }

    /// Takes a token if one is available, otherwise returns how long to wait.
    fn try_take(&self) -> Option<Duration> {
        let mut bucket = self
            .bucket
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refilled = elapsed.as_secs_f64() / self.refill_every.as_secs_f64();
        bucket.tokens = (bucket.tokens + refilled).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return None;
        }

        Some(self.refill_every.mul_f64(1.0 - bucket.tokens))
    }
}
