//! InitiateMultipart, UploadPart, CompleteMultipart, AbortMultipart.
//!
//! Parts are concatenated in `partNumber` order on Complete — each part's
//! scratch bytes are read back from the backend and streamed into the
//! final object sequentially instead of relying on upload order.

use crate::error::S3Error;
use crate::state::AppState;
use crate::xml::{self, CompleteMultipartUploadResult, CompleteMultipartUploadXml, InitiateMultipartUploadResult};
use attestore_common::types::md5_hex;
use attestore_meta_store::{Artifact, MultipartPart};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

fn part_key(key: &str, upload_id: &str, part_number: u32) -> String {
    format!("{key}/.multipart/{upload_id}/part-{part_number}")
}

pub async fn initiate_multipart(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, S3Error> {
    if !state.meta_store.bucket_exists(&bucket).await? {
        return Err(S3Error::NoSuchBucket(bucket));
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let metadata = crate::metadata::extract(&headers);

    let upload = state
        .meta_store
        .create_multipart_upload(&bucket, &key, &content_type, metadata)
        .await?;

    let body = InitiateMultipartUploadResult { bucket, key, upload_id: upload.upload_id };
    Ok((StatusCode::OK, xml::render(&body)))
}

#[derive(Debug, Deserialize)]
pub struct UploadPartParams {
    #[serde(rename = "uploadId")]
    pub(crate) upload_id: String,
    #[serde(rename = "partNumber")]
    pub(crate) part_number: u32,
}

pub async fn upload_part(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<UploadPartParams>,
    body: Bytes,
) -> Result<impl IntoResponse, S3Error> {
    let upload = state.meta_store.get_multipart_upload(&params.upload_id).await?;
    if upload.bucket != bucket || upload.key != key {
        return Err(S3Error::NoSuchUpload(params.upload_id));
    }

    let scratch_key = part_key(&key, &params.upload_id, params.part_number);
    let size = body.len() as u64;
    let digest = attestore_common::types::sha256_hex(&body);
    let etag = md5_hex(&body);

    let reader: attestore_backend::BoxAsyncRead = Box::pin(std::io::Cursor::new(body.to_vec()));
    state.backend.write_object(&bucket, &scratch_key, reader, Some(size)).await?;

    state
        .meta_store
        .put_multipart_part(
            &params.upload_id,
            MultipartPart { part_number: params.part_number, etag: etag.clone(), size: size as i64, digest, uploaded_at: Utc::now() },
        )
        .await?;

    Ok((StatusCode::OK, [(header::ETAG, format!("\"{etag}\""))]))
}

#[derive(Debug, Deserialize)]
pub struct CompleteParams {
    #[serde(rename = "uploadId")]
    pub(crate) upload_id: String,
}

pub async fn complete_multipart(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<CompleteParams>,
    body: Bytes,
) -> Result<Response, S3Error> {
    let upload = state.meta_store.get_multipart_upload(&params.upload_id).await?;
    if upload.bucket != bucket || upload.key != key {
        return Err(S3Error::NoSuchUpload(params.upload_id));
    }

    let mut parts = upload.parts.clone();
    parts.sort_by_key(|p| p.part_number);

    if !body.is_empty() {
        let requested: CompleteMultipartUploadXml = quick_xml::de::from_str(
            std::str::from_utf8(&body).map_err(|e| S3Error::InvalidArgument(e.to_string()))?,
        )
        .map_err(|e| S3Error::InvalidArgument(e.to_string()))?;
        if requested.parts.len() != parts.len() {
            return Err(S3Error::InvalidArgument("part list does not match uploaded parts".to_string()));
        }
        for (requested, recorded) in requested.parts.iter().zip(parts.iter()) {
            let requested_etag = requested.etag.trim_matches('"');
            if requested.part_number != recorded.part_number || requested_etag != recorded.etag {
                return Err(S3Error::InvalidArgument(format!(
                    "part {} etag mismatch",
                    requested.part_number
                )));
            }
        }
    }

    let mut combined = Vec::new();
    for part in &parts {
        let scratch_key = part_key(&key, &params.upload_id, part.part_number);
        let mut reader = state.backend.read_object(&bucket, &scratch_key).await?;
        reader
            .read_to_end(&mut combined)
            .await
            .map_err(|e| S3Error::Internal(e.to_string()))?;
    }

    let size = combined.len() as u64;
    let digest = attestore_common::types::sha256_hex(&combined);
    let md5 = md5_hex(&combined);

    let existing = state.meta_store.get_artifact(&bucket, &key).await.ok();

    let reader: attestore_backend::BoxAsyncRead = Box::pin(std::io::Cursor::new(combined));
    state.backend.write_object(&bucket, &key, reader, Some(size)).await?;

    for part in &parts {
        let scratch_key = part_key(&key, &params.upload_id, part.part_number);
        let _ = state.backend.delete_object(&bucket, &scratch_key).await;
    }

    let now = Utc::now();
    let artifact = Artifact {
        bucket: bucket.clone(),
        key: key.clone(),
        digest,
        size: size as i64,
        content_type: upload.content_type.clone(),
        md5,
        created_at: now,
        updated_at: now,
        storage_path: format!("{bucket}/{key}"),
        metadata: upload.metadata.clone(),
        is_multipart: true,
        upload_id: Some(params.upload_id.clone()),
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
    state.meta_store.delete_multipart_upload(&params.upload_id).await?;

    let body = CompleteMultipartUploadResult { bucket, key, etag: format!("\"{}\"", artifact.md5) };
    Ok((StatusCode::OK, xml::render(&body)).into_response())
}

pub async fn abort_multipart(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<CompleteParams>,
) -> Result<impl IntoResponse, S3Error> {
    let upload = state.meta_store.get_multipart_upload(&params.upload_id).await?;
    for part in &upload.parts {
        let scratch_key = part_key(&key, &params.upload_id, part.part_number);
        let _ = state.backend.delete_object(&bucket, &scratch_key).await;
    }
    state.meta_store.delete_multipart_upload(&params.upload_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
