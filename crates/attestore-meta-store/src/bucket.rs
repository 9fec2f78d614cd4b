//! Bucket namespace operations.

use crate::store::{decode, encode, MetaStore};
use crate::tables::BUCKETS;
use crate::types::Bucket;
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use chrono::Utc;

impl MetaStore {
    pub async fn create_bucket(&self, name: &str) -> Result<Bucket> {
        let bucket = Bucket::new(name);
        let encoded = encode(&bucket)?;
        let db = self.db.clone();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(BUCKETS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                if table
                    .get(name.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                    .is_some()
                {
                    return Err(Error::already_exists(format!("bucket {name} already exists")));
                }
                table
                    .insert(name.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))??;
        Ok(bucket)
    }

    pub async fn get_bucket(&self, name: &str) -> Result<Bucket> {
        let db = self.db.clone();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(BUCKETS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let value = table
                .get(name.as_str())
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                .ok_or_else(|| Error::not_found(format!("bucket {name} does not exist")))?;
            decode(value.value())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn bucket_exists(&self, name: &str) -> Result<bool> {
        match self.get_bucket(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.code == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        let db = self.db.clone();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(BUCKETS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                if table
                    .remove(name.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                    .is_none()
                {
                    return Err(Error::not_found(format!("bucket {name} does not exist")));
                }
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(BUCKETS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let mut buckets = Vec::new();
            for entry in table
                .iter()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
            {
                let (_, value) =
                    entry.map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                buckets.push(decode(value.value())?);
            }
            Ok(buckets)
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    /// Applies a delta to a bucket's object count and total size, e.g.
    /// `(+1, +size)` on a fresh PUT or `(0, new_size - old_size)` when an
    /// existing key is overwritten, `(-1, -size)` on delete.
    pub async fn update_bucket_counters(
        &self,
        name: &str,
        object_delta: i64,
        size_delta: i64,
    ) -> Result<()> {
        let db = self.db.clone();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(BUCKETS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let mut bucket: Bucket = table
                    .get(name.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                    .ok_or_else(|| Error::not_found(format!("bucket {name} does not exist")))
                    .and_then(|v| decode(v.value()))?;
                bucket.object_count += object_delta;
                bucket.total_size += size_delta;
                bucket.updated_at = Utc::now();
                let encoded = encode(&bucket)?;
                table
                    .insert(name.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> MetaStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.redb");
        let store = MetaStore::open(&path).await.unwrap();
        std::mem::forget(dir);
        store
    }

    #[tokio::test]
    async fn create_get_list_delete_roundtrip() {
        let store = store().await;
        store.create_bucket("artifacts").await.unwrap();
        let bucket = store.get_bucket("artifacts").await.unwrap();
        assert_eq!(bucket.name, "artifacts");
        assert_eq!(store.list_buckets().await.unwrap().len(), 1);
        store.delete_bucket("artifacts").await.unwrap();
        assert!(!store.bucket_exists("artifacts").await.unwrap());
    }

    #[tokio::test]
    async fn create_bucket_twice_conflicts() {
        let store = store().await;
        store.create_bucket("dup").await.unwrap();
        let err = store.create_bucket("dup").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn counters_accumulate() {
        let store = store().await;
        store.create_bucket("counted").await.unwrap();
        store.update_bucket_counters("counted", 1, 100).await.unwrap();
        store.update_bucket_counters("counted", 1, 50).await.unwrap();
        let bucket = store.get_bucket("counted").await.unwrap();
        assert_eq!(bucket.object_count, 2);
        assert_eq!(bucket.total_size, 150);
    }
}
