//! Multipart upload session tracking.

use crate::store::{decode, encode, MetaStore};
use crate::tables::{MULTIPART_UPLOADS, UPLOAD_PROGRESS};
use crate::types::{MultipartPart, MultipartUpload, UploadProgress};
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;

impl MetaStore {
    pub async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<MultipartUpload> {
        let upload = MultipartUpload {
            upload_id: uuid::Uuid::new_v4().to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            initiated_at: Utc::now(),
            content_type: content_type.to_string(),
            metadata,
            parts: Vec::new(),
        };
        let encoded = encode(&upload)?;
        let progress_encoded = encode(&UploadProgress::from_upload(&upload))?;
        let db = self.db.clone();
        let upload_id = upload.upload_id.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(MULTIPART_UPLOADS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                table
                    .insert(upload_id.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let mut progress = txn
                    .open_table(UPLOAD_PROGRESS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                progress
                    .insert(upload_id.as_str(), progress_encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))??;
        Ok(upload)
    }

    /// Current progress summary for an in-progress multipart upload, read
    /// from its own `upload_progress` row rather than decoding the full
    /// part list out of `multipart_uploads`.
    pub async fn get_upload_progress(&self, upload_id: &str) -> Result<UploadProgress> {
        let db = self.db.clone();
        let upload_id = upload_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(UPLOAD_PROGRESS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let value = table
                .get(upload_id.as_str())
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                .ok_or_else(|| Error::not_found(format!("upload {upload_id} does not exist")))?;
            decode(value.value())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn get_multipart_upload(&self, upload_id: &str) -> Result<MultipartUpload> {
        let db = self.db.clone();
        let upload_id = upload_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(MULTIPART_UPLOADS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let value = table
                .get(upload_id.as_str())
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                .ok_or_else(|| Error::not_found(format!("upload {upload_id} does not exist")))?;
            decode(value.value())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    /// Records (or replaces, if the same part number is uploaded twice) a
    /// part and keeps `parts` sorted by `part_number`.
    pub async fn put_multipart_part(
        &self,
        upload_id: &str,
        part: MultipartPart,
    ) -> Result<MultipartUpload> {
        let db = self.db.clone();
        let upload_id = upload_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let upload = {
                let mut table = txn
                    .open_table(MULTIPART_UPLOADS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let mut upload: MultipartUpload = table
                    .get(upload_id.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                    .ok_or_else(|| Error::not_found(format!("upload {upload_id} does not exist")))
                    .and_then(|v| decode(v.value()))?;
                upload.parts.retain(|p| p.part_number != part.part_number);
                upload.parts.push(part);
                upload.parts.sort_by_key(|p| p.part_number);
                let encoded = encode(&upload)?;
                table
                    .insert(upload_id.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                upload
            };
            {
                let mut progress = txn
                    .open_table(UPLOAD_PROGRESS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let encoded = encode(&UploadProgress::from_upload(&upload))?;
                progress
                    .insert(upload_id.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(upload)
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn delete_multipart_upload(&self, upload_id: &str) -> Result<()> {
        let db = self.db.clone();
        let upload_id = upload_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(MULTIPART_UPLOADS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                if table
                    .remove(upload_id.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                    .is_none()
                {
                    return Err(Error::not_found(format!("upload {upload_id} does not exist")));
                }
            }
            {
                let mut progress = txn
                    .open_table(UPLOAD_PROGRESS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                progress
                    .remove(upload_id.as_str())
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

    fn part(number: u32) -> MultipartPart {
        MultipartPart {
            part_number: number,
            etag: format!("etag-{number}"),
            size: 1024,
            digest: format!("digest-{number}"),
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn parts_stay_sorted_and_dedup_by_number() {
        let store = store().await;
        let upload = store
            .create_multipart_upload("b", "k", "application/octet-stream", HashMap::new())
            .await
            .unwrap();
        store.put_multipart_part(&upload.upload_id, part(2)).await.unwrap();
        store.put_multipart_part(&upload.upload_id, part(1)).await.unwrap();
        let upload = store.put_multipart_part(&upload.upload_id, part(2)).await.unwrap();
        assert_eq!(upload.parts.len(), 2);
        assert_eq!(upload.parts[0].part_number, 1);
        assert_eq!(upload.parts[1].part_number, 2);
    }

    #[tokio::test]
    async fn delete_then_get_fails() {
        let store = store().await;
        let upload = store
            .create_multipart_upload("b", "k", "text/plain", HashMap::new())
            .await
            .unwrap();
        store.delete_multipart_upload(&upload.upload_id).await.unwrap();
        assert!(store.get_multipart_upload(&upload.upload_id).await.is_err());
    }

    #[tokio::test]
    async fn progress_tracks_parts_and_bytes_received() {
        let store = store().await;
        let upload = store
            .create_multipart_upload("b", "k", "application/octet-stream", HashMap::new())
            .await
            .unwrap();
        let initial = store.get_upload_progress(&upload.upload_id).await.unwrap();
        assert_eq!(initial.parts_received, 0);
        assert_eq!(initial.bytes_received, 0);

        store.put_multipart_part(&upload.upload_id, part(1)).await.unwrap();
        store.put_multipart_part(&upload.upload_id, part(2)).await.unwrap();
        let progress = store.get_upload_progress(&upload.upload_id).await.unwrap();
        assert_eq!(progress.parts_received, 2);
        assert_eq!(progress.bytes_received, 2048);
    }

    #[tokio::test]
    async fn progress_is_removed_with_the_upload() {
        let store = store().await;
        let upload = store
            .create_multipart_upload("b", "k", "text/plain", HashMap::new())
            .await
            .unwrap();
        store.delete_multipart_upload(&upload.upload_id).await.unwrap();
        assert!(store.get_upload_progress(&upload.upload_id).await.is_err());
    }
}
