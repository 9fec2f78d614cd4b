//! PutObject, GetObject, HeadObject, DeleteObject.

use crate::error::S3Error;
use crate::hashing::Md5TeeReader;
use crate::metadata;
use crate::range;
use crate::state::AppState;
use attestore_backend::BoxAsyncRead;
use attestore_common::error::ErrorCode;
use attestore_meta_store::Artifact;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures_util::TryStreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::StreamReader;

fn into_reader(body: Body) -> BoxAsyncRead {
    let stream = body
        .into_data_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    Box::pin(StreamReader::new(stream))
}

pub async fn put_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    if !state.meta_store.bucket_exists(&bucket).await? {
        return Err(S3Error::NoSuchBucket(bucket));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let size_hint = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let user_metadata = metadata::extract(&headers);

    let existing = state.meta_store.get_artifact(&bucket, &key).await.ok();

    let start = Instant::now();
    let (tee, md5_handle) = Md5TeeReader::new(into_reader(body));
    let reader: BoxAsyncRead = Box::pin(tee);
    let outcome = state.backend.write_object(&bucket, &key, reader, size_hint).await?;

    let digest = match outcome.sha256 {
        Some(digest) => digest,
        None => state.backend.get_object_hash(&bucket, &key).await?,
    };
    let md5 = md5_handle.finalize_hex();

    let now = Utc::now();
    let artifact = Artifact {
        bucket: bucket.clone(),
        key: key.clone(),
        digest,
        size: outcome.written as i64,
        content_type: content_type.clone(),
        md5,
        created_at: now,
        updated_at: now,
        storage_path: format!("{bucket}/{key}"),
        metadata: user_metadata,
        is_multipart: false,
        upload_id: None,
        signature_ids: Vec::new(),
        sbom_id: None,
        attestation_ids: Vec::new(),
    };
    let artifact = state.meta_store.store_artifact(artifact).await?;

    let (object_delta, size_delta) = match existing {
        Some(old) => (0i64, artifact.size - old.size),
        None => (1i64, artifact.size),
    };
    state.meta_store.update_bucket_counters(&bucket, object_delta, size_delta).await?;

    crate::metrics::record_upload(&bucket, &content_type, "success", artifact.size as u64, start.elapsed());

    let response = (
        StatusCode::OK,
        [(header::ETAG, format!("\"{}\"", artifact.md5))],
    );
    Ok(response.into_response())
}

pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, S3Error> {
    let start = Instant::now();
    let artifact = match state.meta_store.get_artifact(&bucket, &key).await {
        Ok(a) => a,
        Err(e) if e.code == ErrorCode::NotFound => return Err(S3Error::NoSuchKey(key)),
        Err(e) => return Err(e.into()),
    };

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let parsed_range = range::parse(range_header, artifact.size as u64)
        .map_err(|()| S3Error::InvalidRange { size: artifact.size as u64 })?;

    let (status, content_length, content_range, reader) = match parsed_range {
        None => {
            let reader = state.backend.read_object(&bucket, &key).await?;
            (StatusCode::OK, artifact.size as u64, None, reader)
        }
        Some(range) => {
            let reader = state
                .backend
                .read_object_range(&bucket, &key, range.start, range.len())
                .await?;
            let content_range = format!("bytes {}-{}/{}", range.start, range.end, artifact.size);
            (StatusCode::PARTIAL_CONTENT, range.len(), Some(content_range), reader)
        }
    };

    let body = Body::from_stream(tokio_util::io::ReaderStream::new(reader));
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, &artifact.content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ETAG, format!("\"{}\"", artifact.md5))
        .header(header::LAST_MODIFIED, artifact.updated_at.to_rfc2822());
    if let Some(content_range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }
    builder = metadata::apply(builder, &artifact.metadata);

    crate::metrics::record_download(&bucket, &artifact.content_type, "success", content_length, start.elapsed());

    builder
        .body(body)
        .map_err(|e| S3Error::Internal(e.to_string()))
}

pub async fn head_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, S3Error> {
    let artifact = match state.meta_store.get_artifact(&bucket, &key).await {
        Ok(a) => a,
        Err(e) if e.code == ErrorCode::NotFound => return Err(S3Error::NoSuchKey(key)),
        Err(e) => return Err(e.into()),
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &artifact.content_type)
        .header(header::CONTENT_LENGTH, artifact.size as u64)
        .header(header::ETAG, format!("\"{}\"", artifact.md5))
        .header(header::LAST_MODIFIED, artifact.updated_at.to_rfc2822());
    builder = metadata::apply(builder, &artifact.metadata);
    builder
        .body(Body::empty())
        .map_err(|e| S3Error::Internal(e.to_string()))
}

pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, S3Error> {
    let existing = state.meta_store.get_artifact(&bucket, &key).await.ok();

    let _ = state.backend.delete_object(&bucket, &key).await;
    let _ = state.meta_store.delete_artifact(&bucket, &key).await;

    if let Some(artifact) = existing {
        state
            .meta_store
            .update_bucket_counters(&bucket, -1, -artifact.size)
            .await?;
    }

    crate::metrics::record_delete(&bucket, "success");
    Ok(StatusCode::NO_CONTENT)
}
