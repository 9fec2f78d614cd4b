//! Artifact namespace operations. Artifacts are keyed by
//! `"{bucket}/{key}"`; redb orders `&str` keys lexicographically, so a
//! prefix scan over `"{bucket}/{prefix}"` enumerates a bucket's contents
//! in key order without a secondary index.

use crate::store::{decode, encode, MetaStore};
use crate::tables::ARTIFACTS;
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use chrono::Utc;

use crate::types::Artifact;

fn storage_key(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
}

impl MetaStore {
    /// Upserts an artifact record. `created_at` is preserved across
    /// overwrites of the same key; only `updated_at` moves forward.
    pub async fn store_artifact(&self, mut artifact: Artifact) -> Result<Artifact> {
        let db = self.db.clone();
        let storage_key = storage_key(&artifact.bucket, &artifact.key);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(ARTIFACTS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let now = Utc::now();
                if let Some(existing) = table
                    .get(storage_key.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                {
                    let existing: Artifact = decode(existing.value())?;
                    artifact.created_at = existing.created_at;
                } else {
                    artifact.created_at = now;
                }
                artifact.updated_at = now;
                let encoded = encode(&artifact)?;
                table
                    .insert(storage_key.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(artifact)
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn get_artifact(&self, bucket: &str, key: &str) -> Result<Artifact> {
        let db = self.db.clone();
        let storage_key = storage_key(bucket, key);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(ARTIFACTS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let value = table
                .get(storage_key.as_str())
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                .ok_or_else(|| Error::not_found(format!("object {storage_key} does not exist")))?;
            decode(value.value())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn delete_artifact(&self, bucket: &str, key: &str) -> Result<Artifact> {
        let db = self.db.clone();
        let storage_key = storage_key(bucket, key);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let removed = {
                let mut table = txn
                    .open_table(ARTIFACTS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let removed = table
                    .remove(storage_key.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                    .ok_or_else(|| {
                        Error::not_found(format!("object {storage_key} does not exist"))
                    })?;
                decode::<Artifact>(removed.value())?
            };
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(removed)
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    /// Lists up to `max_keys` artifacts in `bucket` whose key starts with
    /// `prefix`, in lexicographic order. Returns whether more results
    /// exist beyond the page (`is_truncated`).
    pub async fn list_artifacts(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
    ) -> Result<(Vec<Artifact>, bool)> {
        let db = self.db.clone();
        let scan_prefix = storage_key(bucket, prefix);
        let bucket_prefix = format!("{bucket}/");
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(ARTIFACTS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let mut artifacts = Vec::new();
            let mut truncated = false;
            for entry in table
                .range(scan_prefix.as_str()..)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
            {
                let (storage_key, value) =
                    entry.map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let storage_key = storage_key.value();
                if !storage_key.starts_with(&bucket_prefix) {
                    break;
                }
                if !storage_key.starts_with(scan_prefix.as_str()) {
                    break;
                }
                if artifacts.len() == max_keys {
                    truncated = true;
                    break;
                }
                artifacts.push(decode(value.value())?);
            }
            Ok((artifacts, truncated))
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn artifact(bucket: &str, key: &str) -> Artifact {
        Artifact {
            bucket: bucket.to_string(),
            key: key.to_string(),
            digest: attestore_common::types::sha256_hex(key.as_bytes()),
            size: key.len() as i64,
            content_type: "application/octet-stream".to_string(),
            md5: attestore_common::types::md5_hex(key.as_bytes()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            storage_path: format!("{bucket}/{key}"),
            metadata: HashMap::new(),
            is_multipart: false,
            upload_id: None,
            signature_ids: Vec::new(),
            sbom_id: None,
            attestation_ids: Vec::new(),
        }
    }

    async fn store() -> MetaStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.redb");
        let store = MetaStore::open(&path).await.unwrap();
        std::mem::forget(dir);
        store
    }

    #[tokio::test]
    async fn store_get_delete_roundtrip() {
        let store = store().await;
        store.store_artifact(artifact("b", "a.txt")).await.unwrap();
        let got = store.get_artifact("b", "a.txt").await.unwrap();
        assert_eq!(got.key, "a.txt");
        store.delete_artifact("b", "a.txt").await.unwrap();
        assert!(store.get_artifact("b", "a.txt").await.is_err());
    }

    #[tokio::test]
    async fn overwrite_preserves_created_at() {
        let store = store().await;
        let first = store.store_artifact(artifact("b", "k")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.store_artifact(artifact("b", "k")).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn list_respects_prefix_and_pagination() {
        let store = store().await;
        for key in ["a/1", "a/2", "a/3", "b/1"] {
            store.store_artifact(artifact("bucket", key)).await.unwrap();
        }
        let (page, truncated) = store.list_artifacts("bucket", "a/", 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(truncated);
        let (all, truncated) = store.list_artifacts("bucket", "a/", 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(!truncated);
    }

    #[tokio::test]
    async fn list_does_not_leak_across_buckets() {
        let store = store().await;
        store.store_artifact(artifact("alpha", "k")).await.unwrap();
        store.store_artifact(artifact("alphabet", "k")).await.unwrap();
        let (page, _) = store.list_artifacts("alpha", "", 10).await.unwrap();
        assert_eq!(page.len(), 1);
    }
}
