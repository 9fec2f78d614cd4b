//! Filesystem-backed [`Backend`].
//!
//! Layout: `{root}/{bucket}/{key}`, with an optional `<path>.sha256`
//! sidecar holding the hex digest when checksums are enabled. Writes are
//! atomic (`.tmp` + rename); a single process-wide `RwLock` serializes path
//! operations — writes take it exclusively, reads take it shared, matching
//! the contract that a concurrent reader never observes a torn write.

use crate::checksum::{is_checksum_mismatch, ChecksumVerifyingReader, HashingReader};
use crate::{Backend, BoxAsyncRead, WriteOutcome};
use async_trait::async_trait;
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub struct FilesystemBackend {
    root: PathBuf,
    enable_checksum: bool,
    /// One process-wide lock: shared for reads, exclusive for writes. This
    /// is coarser than per-key locking, but the backend contract only
    /// requires atomicity per (bucket, key), and the underlying rename is
    /// already atomic at the filesystem level — the lock exists to keep
    /// directory create/delete and file rename from interleaving.
    lock: RwLock<()>,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>, enable_checksum: bool) -> Self {
        Self {
            root: root.into(),
            enable_checksum,
            lock: RwLock::new(()),
        }
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut p = path.as_os_str().to_owned();
        p.push(".sha256");
        PathBuf::from(p)
    }

    async fn read_sidecar(path: &Path) -> Option<String> {
        fs::read_to_string(Self::sidecar_path(path))
            .await
            .ok()
            .map(|s| s.trim().to_string())
    }
}

#[async_trait]
impl Backend for FilesystemBackend {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        let path = self.bucket_path(bucket);
        fs::create_dir_all(&path).await.map_err(|e| {
            Error::new(ErrorCode::WriteError, format!("create bucket: {e}")).with_source(e)
        })
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        let path = self.bucket_path(bucket);
        let mut entries = match fs::read_dir(&path).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(Error::new(ErrorCode::StatError, format!("delete bucket: {e}"))
                    .with_source(e))
            }
        };
        let has_entry = entries
            .next_entry()
            .await
            .map_err(|e| Error::new(ErrorCode::StatError, format!("delete bucket: {e}")).with_source(e))?
            .is_some();
        if has_entry {
            return Err(Error::new(
                ErrorCode::BucketNotEmpty,
                format!("bucket {bucket} is not empty"),
            ));
        }
        fs::remove_dir(&path).await.map_err(|e| {
            Error::new(ErrorCode::WriteError, format!("delete bucket: {e}")).with_source(e)
        })
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let _guard = self.lock.read().await;
        Ok(fs::metadata(self.bucket_path(bucket)).await.is_ok())
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        mut reader: BoxAsyncRead,
        _size: Option<u64>,
    ) -> Result<WriteOutcome> {
        let _guard = self.lock.write().await;
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::new(ErrorCode::WriteError, format!("create parent dir: {e}"))
                    .with_source(e)
            })?;
        }
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let written;
        let sha256;
        {
            let mut tmp = fs::File::create(&tmp_path).await.map_err(|e| {
                Error::new(ErrorCode::WriteError, format!("create temp file: {e}")).with_source(e)
            })?;
            if self.enable_checksum {
                let mut hashing = HashingReader::new(&mut reader);
                written = tokio::io::copy(&mut hashing, &mut tmp).await.map_err(|e| {
                    Error::new(ErrorCode::WriteError, format!("write object: {e}")).with_source(e)
                })?;
                sha256 = Some(hashing.finalize_hex());
            } else {
                written = tokio::io::copy(&mut reader, &mut tmp).await.map_err(|e| {
                    Error::new(ErrorCode::WriteError, format!("write object: {e}")).with_source(e)
                })?;
                sha256 = None;
            }
            tmp.flush().await.ok();
            tmp.sync_all().await.map_err(|e| {
                Error::new(ErrorCode::WriteError, format!("sync temp file: {e}")).with_source(e)
            })?;
        }

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            Error::new(ErrorCode::WriteError, format!("rename into place: {e}")).with_source(e)
        })?;

        if let Some(digest) = &sha256 {
            if let Err(e) = fs::write(Self::sidecar_path(&path), digest).await {
                warn!(bucket, key, error = %e, "failed to persist sha256 sidecar");
            }
        } else {
            let _ = fs::remove_file(Self::sidecar_path(&path)).await;
        }

        debug!(bucket, key, written, "wrote object");
        Ok(WriteOutcome { written, sha256 })
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        let _guard = self.lock.read().await;
        let path = self.object_path(bucket, key);
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::new(ErrorCode::NotFound, format!("{bucket}/{key}")).with_source(e)
            } else {
                Error::new(ErrorCode::ReadError, format!("open object: {e}")).with_source(e)
            }
        })?;

        if self.enable_checksum {
            if let Some(expected) = Self::read_sidecar(&path).await {
                return Ok(Box::pin(ChecksumVerifyingReader::new(file, expected)));
            }
        }
        Ok(Box::pin(file))
    }

    async fn read_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<BoxAsyncRead> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};
        let _guard = self.lock.read().await;
        let path = self.object_path(bucket, key);
        let mut file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::new(ErrorCode::NotFound, format!("{bucket}/{key}")).with_source(e)
            } else {
                Error::new(ErrorCode::ReadError, format!("open object: {e}")).with_source(e)
            }
        })?;
        file.seek(std::io::SeekFrom::Start(offset)).await.map_err(|e| {
            Error::new(ErrorCode::ReadError, format!("seek object: {e}")).with_source(e)
        })?;
        Ok(Box::pin(file.take(length)))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        let path = self.object_path(bucket, key);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::new(ErrorCode::WriteError, format!("delete object: {e}"))
                    .with_source(e))
            }
        }
        let _ = fs::remove_file(Self::sidecar_path(&path)).await;
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let _guard = self.lock.read().await;
        Ok(fs::metadata(self.object_path(bucket, key)).await.is_ok())
    }

    async fn get_object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let _guard = self.lock.read().await;
        let meta = fs::metadata(self.object_path(bucket, key)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::new(ErrorCode::NotFound, format!("{bucket}/{key}")).with_source(e)
            } else {
                Error::new(ErrorCode::StatError, format!("stat object: {e}")).with_source(e)
            }
        })?;
        Ok(meta.len())
    }

    async fn get_object_hash(&self, bucket: &str, key: &str) -> Result<String> {
        let path = self.object_path(bucket, key);
        {
            let _guard = self.lock.read().await;
            if let Some(hash) = Self::read_sidecar(&path).await {
                return Ok(hash);
            }
        }
        // No stored hash: stream the object and compute it.
        use sha2::Digest;
        let mut reader = self.read_object(bucket, key).await?;
        let mut hasher = sha2::Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = tokio::io::AsyncReadExt::read(&mut reader, &mut buf)
                .await
                .map_err(|e| Error::new(ErrorCode::HashError, format!("hash object: {e}")).with_source(e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    async fn health_check(&self) -> Result<()> {
        let probe = self.root.join(format!(".health-{}", uuid_like_suffix()));
        fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::new(ErrorCode::HealthCheckFailed, format!("health check: {e}")).with_source(e)
        })?;
        fs::write(&probe, b"ok").await.map_err(|e| {
            Error::new(ErrorCode::HealthCheckFailed, format!("health check: {e}")).with_source(e)
        })?;
        let _ = fs::remove_file(&probe).await;
        Ok(())
    }
}

/// Cheap unique suffix for the health-check probe file, avoiding a `uuid`
/// dependency just for this.
fn uuid_like_suffix() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn reader_from(bytes: &'static [u8]) -> BoxAsyncRead {
        Box::pin(std::io::Cursor::new(bytes))
    }

    #[tokio::test]
    async fn round_trip_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path(), true);
        backend.create_bucket("releases").await.unwrap();
        let outcome = backend
            .write_object("releases", "app.tgz", reader_from(b"hello"), Some(5))
            .await
            .unwrap();
        assert_eq!(outcome.written, 5);
        assert!(outcome.sha256.is_some());

        let mut r = backend.read_object("releases", "app.tgz").await.unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn range_read_returns_subslice() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path(), true);
        backend.create_bucket("x").await.unwrap();
        backend
            .write_object("x", "f", reader_from(b"hello world"), Some(11))
            .await
            .unwrap();
        let mut r = backend.read_object_range("x", "f", 6, 5).await.unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"world");
    }

    #[tokio::test]
    async fn delete_bucket_fails_when_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path(), false);
        backend.create_bucket("x").await.unwrap();
        backend
            .write_object("x", "f", reader_from(b"d"), Some(1))
            .await
            .unwrap();
        let err = backend.delete_bucket("x").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BucketNotEmpty);
    }

    #[tokio::test]
    async fn overwrite_replaces_bytes_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path(), false);
        backend.create_bucket("x").await.unwrap();
        backend
            .write_object("x", "f", reader_from(b"first"), Some(5))
            .await
            .unwrap();
        backend
            .write_object("x", "f", reader_from(b"second-longer"), Some(13))
            .await
            .unwrap();
        assert_eq!(backend.get_object_size("x", "f").await.unwrap(), 13);
    }

    #[tokio::test]
    async fn get_object_hash_computes_when_no_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path(), false);
        backend.create_bucket("x").await.unwrap();
        backend
            .write_object("x", "f", reader_from(b"hello"), Some(5))
            .await
            .unwrap();
        let hash = backend.get_object_hash("x", "f").await.unwrap();
        assert_eq!(hash, attestore_common::types::sha256_hex(b"hello"));
    }
}
