//! `RetryBackend`: decorates any [`Backend`] with retry-with-backoff and
//! a per-bucket circuit breaker. Writes buffer the full payload in
//! memory up front so a retried attempt can replay the exact same bytes;
//! reads retry because GET/HEAD are idempotent.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::manager::CircuitBreakerManager;
use crate::retryer::{Retryer, RetryerConfig};
use async_trait::async_trait;
use attestore_backend::{Backend, BoxAsyncRead, WriteOutcome};
use attestore_common::error::ErrorCode;
use attestore_common::Result;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

pub struct RetryBackend<B> {
    inner: B,
    retryer: Retryer,
    breakers: CircuitBreakerManager,
}

impl<B: Backend> RetryBackend<B> {
    #[must_use]
    pub fn new(inner: B, retry_config: RetryerConfig, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            retryer: Retryer::new(retry_config),
            breakers: CircuitBreakerManager::new(breaker_config),
        }
    }

    async fn with_retry<T, F, Fut>(&self, bucket: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let breaker = self.breakers.get(bucket);
        self.retryer
            .run(|| {
                let breaker = Arc::clone(&breaker);
                let op = &op;
                async move { breaker.call(|| op()).await }
            })
            .await
    }
}

#[async_trait]
impl<B: Backend> Backend for RetryBackend<B> {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.with_retry(bucket, || self.inner.create_bucket(bucket)).await
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.with_retry(bucket, || self.inner.delete_bucket(bucket)).await
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.with_retry(bucket, || self.inner.bucket_exists(bucket)).await
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        mut reader: BoxAsyncRead,
        _size: Option<u64>,
    ) -> Result<WriteOutcome> {
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| attestore_common::Error::new(ErrorCode::ReadError, e.to_string()).with_source(e))?;
        let size = buffer.len() as u64;
        self.with_retry(bucket, || {
            let body = buffer.clone();
            async move {
                let reader: BoxAsyncRead = Box::pin(std::io::Cursor::new(body));
                self.inner.write_object(bucket, key, reader, Some(size)).await
            }
        })
        .await
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        self.with_retry(bucket, || self.inner.read_object(bucket, key)).await
    }

    async fn read_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<BoxAsyncRead> {
        self.with_retry(bucket, || self.inner.read_object_range(bucket, key, offset, length))
            .await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.with_retry(bucket, || self.inner.delete_object(bucket, key)).await
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        self.with_retry(bucket, || self.inner.object_exists(bucket, key)).await
    }

    async fn get_object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        self.with_retry(bucket, || self.inner.get_object_size(bucket, key)).await
    }

    async fn get_object_hash(&self, bucket: &str, key: &str) -> Result<String> {
        self.with_retry(bucket, || self.inner.get_object_hash(bucket, key)).await
    }

    async fn health_check(&self) -> Result<()> {
        self.with_retry("__health__", || self.inner.health_check()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestore_common::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyBackend {
        exists_calls: AtomicU32,
        fail_times: u32,
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        async fn create_bucket(&self, _bucket: &str) -> Result<()> {
            Ok(())
        }
        async fn delete_bucket(&self, _bucket: &str) -> Result<()> {
            Ok(())
        }
        async fn bucket_exists(&self, _bucket: &str) -> Result<bool> {
            let n = self.exists_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(Error::new(ErrorCode::ServiceUnavailable, "flaky"))
            } else {
                Ok(true)
            }
        }
        async fn write_object(
            &self,
            _bucket: &str,
            _key: &str,
            mut reader: BoxAsyncRead,
            _size: Option<u64>,
        ) -> Result<WriteOutcome> {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await.unwrap();
            Ok(WriteOutcome { written: buf.len() as u64, sha256: None })
        }
        async fn read_object(&self, _bucket: &str, _key: &str) -> Result<BoxAsyncRead> {
            Ok(Box::pin(std::io::Cursor::new(b"hi".to_vec())))
        }
        async fn read_object_range(
            &self,
            _bucket: &str,
            _key: &str,
            _offset: u64,
            _length: u64,
        ) -> Result<BoxAsyncRead> {
            Ok(Box::pin(std::io::Cursor::new(b"h".to_vec())))
        }
        async fn delete_object(&self, _bucket: &str, _key: &str) -> Result<()> {
            Ok(())
        }
        async fn object_exists(&self, _bucket: &str, _key: &str) -> Result<bool> {
            Ok(true)
        }
        async fn get_object_size(&self, _bucket: &str, _key: &str) -> Result<u64> {
            Ok(2)
        }
        async fn get_object_hash(&self, _bucket: &str, _key: &str) -> Result<String> {
            Ok("abc".to_string())
        }
        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn retry_config() -> RetryerConfig {
        RetryerConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 1.0,
            randomize_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn retries_transient_read_failures() {
        let backend = RetryBackend::new(
            FlakyBackend { exists_calls: AtomicU32::new(0), fail_times: 2 },
            retry_config(),
            CircuitBreakerConfig::default(),
        );
        assert!(backend.bucket_exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn write_replays_buffered_body() {
        let backend = RetryBackend::new(
            FlakyBackend { exists_calls: AtomicU32::new(0), fail_times: 0 },
            retry_config(),
            CircuitBreakerConfig::default(),
        );
        let reader: BoxAsyncRead = Box::pin(std::io::Cursor::new(b"hello".to_vec()));
        let outcome = backend.write_object("b", "k", reader, None).await.unwrap();
        assert_eq!(outcome.written, 5);
    }
}
