//! The metadata store: a single-file embedded database holding every
//! namespace (buckets, artifacts, multipart uploads, policies, audit
//! logs, supply-chain records). Writes are serialized by redb's
//! single-writer transaction model; reads run concurrently against a
//! snapshot, so no additional locking is needed here.

use crate::tables::{
    ARTIFACTS, ATTESTATIONS, ATTESTATIONS_BY_ARTIFACT, AUDIT_LOGS, BUCKETS, MULTIPART_UPLOADS,
    POLICIES, SBOMS, SBOM_BY_ARTIFACT, SIGNATURES, SIGNATURES_BY_ARTIFACT, UPLOAD_PROGRESS,
};
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use redb::Database;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How long `MetaStore::open` retries before giving up on a locked
/// database file (another process already holds it).
const OPEN_RETRY_TIMEOUT: Duration = Duration::from_secs(1);
const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(50);

pub struct MetaStore {
    pub(crate) db: Arc<Database>,
}

impl MetaStore {
    /// Open (creating if absent) the database file at `path`. Retries for
    /// up to one second if the file is locked by another process before
    /// failing, so short-lived contention (e.g. a previous instance still
    /// shutting down) doesn't surface as a hard error.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let deadline = tokio::time::Instant::now() + OPEN_RETRY_TIMEOUT;

        loop {
            let path = path.clone();
            let attempt =
                tokio::task::spawn_blocking(move || Database::create(&path)).await.map_err(
                    |e| Error::new(ErrorCode::Internal, format!("open task panicked: {e}")),
                )?;

            match attempt {
                Ok(db) => {
                    let store = Self { db: Arc::new(db) };
                    store.init_tables()?;
                    return Ok(store);
                }
                Err(err) if tokio::time::Instant::now() < deadline => {
                    tracing::debug!(%err, "metadata store locked, retrying");
                    tokio::time::sleep(OPEN_RETRY_INTERVAL).await;
                }
                Err(err) => {
                    return Err(Error::new(
                        ErrorCode::InvalidConfig,
                        format!("failed to open metadata store at {}: {err}", path.display()),
                    )
                    .with_source(err));
                }
            }
        }
    }

    /// Creates every table so later read-only transactions never hit a
    /// `TableDoesNotExist` error on a freshly created database file.
    fn init_tables(&self) -> Result<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
        {
            txn.open_table(BUCKETS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(ARTIFACTS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(MULTIPART_UPLOADS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(UPLOAD_PROGRESS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(POLICIES)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(AUDIT_LOGS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(SIGNATURES)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(SIGNATURES_BY_ARTIFACT)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(SBOMS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(SBOM_BY_ARTIFACT)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(ATTESTATIONS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            txn.open_table(ATTESTATIONS_BY_ARTIFACT)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
        }
        txn.commit()
            .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
        Ok(())
    }

    /// Round-trips a read transaction to confirm the database file is
    /// still reachable and not corrupted.
    pub async fn health_check(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::HealthCheckFailed, e.to_string()).with_source(e))?;
            txn.open_table(BUCKETS)
                .map_err(|e| Error::new(ErrorCode::HealthCheckFailed, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("health check task panicked: {e}")))?
    }
}

/// Serializes a record with bincode, the encoding every namespace module
/// uses for values stored in redb tables.
pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| Error::new(ErrorCode::Internal, format!("encode failed: {e}")).with_source(e))
}

/// Deserializes a record previously written with [`encode`].
pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| Error::new(ErrorCode::Internal, format!("decode failed: {e}")).with_source(e))
}
