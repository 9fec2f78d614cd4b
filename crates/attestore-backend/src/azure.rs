//! Azure Blob Storage [`Backend`]. Like the S3 driver, uses one configured
//! container with per-tenant "buckets" folded into a blob-name prefix.

use crate::checksum::HashingReader;
use crate::{Backend, BoxAsyncRead, WriteOutcome};
use async_trait::async_trait;
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::*;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncReadExt;

pub struct AzureBackend {
    container_client: ContainerClient,
    enable_checksum: bool,
}

impl AzureBackend {
    pub fn new(account: impl Into<String>, container: impl Into<String>, access_key: impl Into<String>, enable_checksum: bool) -> Result<Self> {
        let account = account.into();
        let credentials = StorageCredentials::access_key(account.clone(), access_key.into());
        let service = BlobServiceClient::new(account, credentials);
        let container_client = service.container_client(container.into());
        Ok(Self {
            container_client,
            enable_checksum,
        })
    }

    fn blob_name(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }

    fn blob(&self, bucket: &str, key: &str) -> BlobClient {
        self.container_client.blob_client(Self::blob_name(bucket, key))
    }

    fn map_err(code: ErrorCode, err: azure_storage::Error) -> Error {
        let msg = err.to_string();
        let code = if msg.contains("BlobNotFound") || msg.contains("404") {
            ErrorCode::NotFound
        } else {
            code
        };
        Error::new(code, msg).with_source(err)
    }
}

#[async_trait]
impl Backend for AzureBackend {
    async fn create_bucket(&self, _bucket: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let prefix = format!("{bucket}/");
        let mut pager = self
            .container_client
            .list_blobs()
            .prefix(prefix)
            .max_results(std::num::NonZeroU32::new(1).unwrap())
            .into_stream();
        if let Some(page) = pager.next().await {
            let page = page.map_err(|e| Self::map_err(ErrorCode::StatError, e))?;
            if !page.blobs.items.is_empty() {
                return Err(Error::new(
                    ErrorCode::BucketNotEmpty,
                    format!("bucket {bucket} is not empty"),
                ));
            }
        }
        Ok(())
    }

    async fn bucket_exists(&self, _bucket: &str) -> Result<bool> {
        self.container_client
            .get_properties()
            .await
            .map(|_| true)
            .or_else(|e| {
                if e.to_string().contains("404") {
                    Ok(false)
                } else {
                    Err(Self::map_err(ErrorCode::StatError, e))
                }
            })
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

        let blob = self.blob(bucket, key);
        let mut builder = blob.put_block_blob(Bytes::from(body));
        if let Some(digest) = &sha256 {
            let mut metadata = azure_storage_blobs::blob::Metadata::new();
            metadata.insert("sha256", digest.clone());
            builder = builder.metadata(metadata);
        }
        builder
            .await
            .map_err(|e| Self::map_err(ErrorCode::WriteError, e))?;

        Ok(WriteOutcome { written, sha256 })
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        let blob = self.blob(bucket, key);
        let data = blob
            .get_content()
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
        let blob = self.blob(bucket, key);
        let range = azure_storage::prelude::Range::new(offset, offset + length);
        let data = blob
            .get()
            .range(range)
            .into_stream()
            .next()
            .await
            .ok_or_else(|| Error::new(ErrorCode::NotFound, format!("{bucket}/{key}")))?
            .map_err(|e| Self::map_err(ErrorCode::ReadError, e))?
            .data
            .collect()
            .await
            .map_err(|e| Error::new(ErrorCode::ReadError, e.to_string()))?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        match self.blob(bucket, key).delete().await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("404") => Ok(()),
            Err(e) => Err(Self::map_err(ErrorCode::WriteError, e)),
        }
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        self.blob(bucket, key)
            .get_properties()
            .await
            .map(|_| true)
            .or_else(|e| {
                if e.to_string().contains("404") {
                    Ok(false)
                } else {
                    Err(Self::map_err(ErrorCode::StatError, e))
                }
            })
    }

    async fn get_object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let props = self
            .blob(bucket, key)
            .get_properties()
            .await
            .map_err(|e| Self::map_err(ErrorCode::StatError, e))?;
        Ok(props.blob.properties.content_length)
    }

    async fn get_object_hash(&self, bucket: &str, key: &str) -> Result<String> {
        let props = self
            .blob(bucket, key)
            .get_properties()
            .await
            .map_err(|e| Self::map_err(ErrorCode::StatError, e))?;
        if let Some(digest) = props.blob.metadata.as_ref().and_then(|m| m.get("sha256")) {
            return Ok(digest.clone());
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
        self.container_client
            .get_properties()
            .await
            .map(|_| ())
            .map_err(|e| Self::map_err(ErrorCode::HealthCheckFailed, e))
    }
}
