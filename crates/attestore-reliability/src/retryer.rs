//! Exponential-jittered backoff retry.

use attestore_common::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry policy. Delay before attempt `k` (1-indexed) is
/// `min(max_delay, initial_delay * multiplier^(k-1))`, then jittered by
/// `1 + (U(0,1)*2 - 1) * randomize_factor`.
#[derive(Debug, Clone, Copy)]
pub struct RetryerConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub randomize_factor: f64,
}

impl Default for RetryerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            randomize_factor: 0.2,
        }
    }
}

impl RetryerConfig {
    /// Delay before attempt `k` (1-indexed), before jitter is applied.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX));
        let millis = (self.initial_delay.as_secs_f64() * exp * 1000.0).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let u: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let factor = 1.0 + (u * 2.0 - 1.0) * self.randomize_factor;
        Duration::from_secs_f64((base.as_secs_f64() * factor).max(0.0))
    }
}

/// Runs `op` under this policy, retrying while the returned error is
/// [`attestore_common::Error::is_retryable`] and attempts remain.
pub struct Retryer {
    config: RetryerConfig,
}

impl Retryer {
    #[must_use]
    pub const fn new(config: RetryerConfig) -> Self {
        Self { config }
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.config.max_attempts && err.is_retryable() => {
                    let delay = self.config.jittered_delay(attempt);
                    tracing::debug!(attempt, ?delay, code = %err.code, "retrying after failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestore_common::error::ErrorCode;
    use attestore_common::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let retryer = Retryer::new(RetryerConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 1.0,
            randomize_factor: 0.0,
        });
        let calls = AtomicU32::new(0);
        let result = retryer
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::new(ErrorCode::ServiceUnavailable, "down"))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let retryer = Retryer::new(RetryerConfig::default());
        let calls = AtomicU32::new(0);
        let result: Result<()> = retryer
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::new(ErrorCode::NotFound, "missing"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let retryer = Retryer::new(RetryerConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            multiplier: 1.0,
            randomize_factor: 0.0,
        });
        let calls = AtomicU32::new(0);
        let result: Result<()> = retryer
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::new(ErrorCode::ServiceUnavailable, "down"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn base_delay_caps_at_max() {
        let config = RetryerConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            randomize_factor: 0.0,
        };
        assert_eq!(config.base_delay(1), Duration::from_millis(100));
        assert_eq!(config.base_delay(2), Duration::from_millis(200));
        assert_eq!(config.base_delay(10), Duration::from_secs(1));
    }
}
