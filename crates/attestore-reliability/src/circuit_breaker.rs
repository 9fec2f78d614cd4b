//! Three-state circuit breaker (Closed / Open / HalfOpen) and a
//! name-keyed registry of breaker instances.

use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub max_failures: u32,
    pub timeout: Duration,
    pub half_open_success: u32,
    pub half_open_max: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            timeout: Duration::from_secs(30),
            half_open_success: 2,
            half_open_max: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    last_fail_time: Option<Instant>,
    half_open_successes: u32,
    half_open_inflight: u32,
}

/// Guards calls to a single downstream resource. `MaxFailures`
/// consecutive failures in Closed trip it to Open; after `Timeout` the
/// next call is admitted as a HalfOpen probe; `HalfOpenSuccess`
/// consecutive probe successes close it again, any probe failure
/// reopens it immediately.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                last_fail_time: None,
                half_open_successes: 0,
                half_open_inflight: 0,
            }),
        }
    }

    /// Whether this call should be admitted, transitioning Open -> HalfOpen
    /// when the timeout has elapsed.
    fn admit(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => true,
            State::Open => {
                let elapsed = inner
                    .last_fail_time
                    .map_or(Duration::MAX, |t| t.elapsed());
                if elapsed >= self.config.timeout {
                    inner.state = State::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.half_open_inflight = 1;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => {
                if inner.half_open_inflight < self.config.half_open_max {
                    inner.half_open_inflight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.consecutive_failures = 0;
            }
            State::HalfOpen => {
                inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_success {
                    inner.state = State::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                }
            }
            State::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.max_failures {
                    inner.state = State::Open;
                    inner.last_fail_time = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
                inner.state = State::Open;
                inner.last_fail_time = Some(Instant::now());
                inner.half_open_successes = 0;
            }
            State::Open => {}
        }
    }

    /// Runs `op` if the breaker admits the call, otherwise returns a
    /// `CIRCUIT_OPEN` error without invoking it.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.admit() {
            return Err(Error::new(ErrorCode::CircuitOpen, "circuit breaker is open"));
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        self.inner.lock().unwrap().state == State::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestore_common::error::ErrorCode as Code;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            max_failures: 2,
            timeout: Duration::from_millis(20),
            half_open_success: 2,
            half_open_max: 2,
        }
    }

    #[tokio::test]
    async fn opens_after_max_failures() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _: Result<()> = cb
                .call(|| async { Err(Error::new(Code::ServiceUnavailable, "down")) })
                .await;
        }
        assert!(cb.is_open());
        let result: Result<()> = cb.call(|| async { Ok(()) }).await;
        assert_eq!(result.unwrap_err().code, Code::CircuitOpen);
    }

    #[tokio::test]
    async fn half_open_then_closes_after_successes() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _: Result<()> = cb
                .call(|| async { Err(Error::new(Code::ServiceUnavailable, "down")) })
                .await;
        }
        assert!(cb.is_open());
        tokio::time::sleep(Duration::from_millis(25)).await;
        for _ in 0..2 {
            let result = cb.call(|| async { Ok(()) }).await;
            assert!(result.is_ok());
        }
        assert!(!cb.is_open());
        let result = cb.call(|| async { Ok(()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _: Result<()> = cb
                .call(|| async { Err(Error::new(Code::ServiceUnavailable, "down")) })
                .await;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
        let result: Result<()> = cb
            .call(|| async { Err(Error::new(Code::ServiceUnavailable, "still down")) })
            .await;
        assert!(result.is_err());
        assert!(cb.is_open());
    }
}
