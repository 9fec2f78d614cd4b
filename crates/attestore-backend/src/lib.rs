//! The [`Backend`] trait: a uniform durable byte store contract implemented
//! by the filesystem, S3, Azure Blob, and GCS drivers. The S3 handler and
//! the reliability layer's `RetryBackend` wrapper depend only on this
//! trait, never on a concrete driver.

pub mod checksum;
pub mod filesystem;
pub mod gcs;
pub mod s3;
pub mod azure;

use async_trait::async_trait;
use attestore_common::Result;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// A boxed, owned, `Unpin` async byte stream — what every read-side method
/// returns and what `write_object` accepts, so callers never need to name
/// the concrete reader type.
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Outcome of a completed [`Backend::write_object`] call.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Bytes actually written — authoritative even when the caller passed
    /// a size hint, since streaming sources (chunked bodies) may not know
    /// their length up front.
    pub written: u64,
    /// sha256 hex digest computed while streaming, present whenever the
    /// backend's `enable_checksum` is on.
    pub sha256: Option<String>,
}

/// Uniform contract exposed to the S3 handler layer, used uniformly across
/// local filesystem, S3/S3-compatible, Azure Blob, and GCS storage.
///
/// Implementations must honor:
/// - atomic writes (a concurrent reader sees either the old or the new
///   bytes, never a torn state);
/// - the error taxonomy in `attestore_common::ErrorCode` (`NOT_FOUND`,
///   `READ_ERROR`, `WRITE_ERROR`, `STAT_ERROR`, `HASH_ERROR`,
///   `HEALTH_CHECK_FAILED`, `INVALID_CONFIG`, `BUCKET_NOT_EMPTY`,
///   `CHECKSUM_MISMATCH`);
/// - checksum verification on `read_object` (not `read_object_range`) when
///   checksums are enabled and a stored hash exists.
#[async_trait]
pub trait Backend: Send + Sync {
    /// No-op on backends that use a single container plus key prefixes
    /// (S3/Azure/GCS); creates a directory on the filesystem backend.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// No-op on single-container backends; removes an empty directory on
    /// the filesystem backend (`BUCKET_NOT_EMPTY` if it isn't).
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Always probes the single configured container on cloud backends;
    /// checks for a directory on the filesystem backend.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Write `reader` atomically to `(bucket, key)`. `size` is an optional
    /// hint; the returned [`WriteOutcome::written`] reflects bytes actually
    /// streamed. When checksums are enabled the sha256 is computed while
    /// streaming and persisted as a sidecar (filesystem) or object metadata
    /// key `sha256` (cloud).
    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        reader: BoxAsyncRead,
        size: Option<u64>,
    ) -> Result<WriteOutcome>;

    /// Stream the full object. When checksums are enabled and a stored hash
    /// exists, the returned reader verifies it during `poll_read` and fails
    /// the final read with `CHECKSUM_MISMATCH` at EOF on mismatch.
    async fn read_object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead>;

    /// Stream the half-open byte range `[offset, offset + length)`.
    /// Checksum verification is disabled for range reads.
    async fn read_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<BoxAsyncRead>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    async fn get_object_size(&self, bucket: &str, key: &str) -> Result<u64>;

    /// Returns the stored sha256 hex digest. If the stored metadata lacks a
    /// hash (checksums were disabled at write time, or the backend never
    /// recorded one), streams the object and computes it on demand.
    async fn get_object_hash(&self, bucket: &str, key: &str) -> Result<String>;

    /// Cheap liveness probe: a write-probe (temp file + delete) on the
    /// filesystem backend, a metadata/list call on cloud backends.
    async fn health_check(&self) -> Result<()>;
}
