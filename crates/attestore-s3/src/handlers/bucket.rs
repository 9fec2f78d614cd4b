//! ListBuckets, CreateBucket, DeleteBucket, ListObjects.

use crate::error::S3Error;
use crate::state::AppState;
use crate::xml::{self, BucketEntry, Buckets, ListBucketResult, ListBucketsResult, ObjectContent, Owner};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_MAX_KEYS: usize = 1000;
const MAX_MAX_KEYS: usize = 1000;

pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, S3Error> {
    let buckets = state.meta_store.list_buckets().await?;
    let body = ListBucketsResult {
        owner: Owner { id: "attestore".to_string(), display_name: "attestore".to_string() },
        buckets: Buckets {
            bucket: buckets
                .into_iter()
                .map(|b| BucketEntry { name: b.name, creation_date: b.created_at.to_rfc3339() })
                .collect(),
        },
    };
    Ok((StatusCode::OK, xml::render(&body)))
}

pub async fn create_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, S3Error> {
    state.backend.create_bucket(&bucket).await?;
    match state.meta_store.create_bucket(&bucket).await {
        Ok(_) => Ok(StatusCode::OK),
        Err(e) if e.code == attestore_common::error::ErrorCode::AlreadyExists => {
            Err(S3Error::BucketAlreadyExists(bucket))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, S3Error> {
    let (artifacts, _) = state.meta_store.list_artifacts(&bucket, "", 1).await?;
    if !artifacts.is_empty() {
        return Err(S3Error::BucketNotEmpty(bucket));
    }
    state.backend.delete_bucket(&bucket).await?;
    state.meta_store.delete_bucket(&bucket).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Default)]
pub struct ListObjectsParams {
    #[serde(default)]
    prefix: String,
    #[serde(rename = "max-keys")]
    max_keys: Option<usize>,
}

pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(params): Query<ListObjectsParams>,
) -> Result<impl IntoResponse, S3Error> {
    if !state.meta_store.bucket_exists(&bucket).await? {
        return Err(S3Error::NoSuchBucket(bucket));
    }
    let max_keys = params.max_keys.unwrap_or(DEFAULT_MAX_KEYS).min(MAX_MAX_KEYS);
    let (artifacts, is_truncated) = state.meta_store.list_artifacts(&bucket, &params.prefix, max_keys).await?;

    let body = ListBucketResult {
        name: bucket,
        prefix: params.prefix,
        max_keys: max_keys as u32,
        is_truncated,
        contents: artifacts
            .into_iter()
            .map(|a| ObjectContent {
                key: a.key,
                last_modified: a.updated_at.to_rfc3339(),
                etag: format!("\"{}\"", a.md5),
                size: a.size,
                storage_class: "STANDARD".to_string(),
            })
            .collect(),
    };
    Ok((StatusCode::OK, xml::render(&body)))
}
