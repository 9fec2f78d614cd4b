//! Entry points registered directly on the router for routes that the
//! S3 API overloads through query parameters rather than distinct
//! paths: `PUT`/`GET`/`POST`/`DELETE` on an object key all pick between
//! several operations depending on which query keys are present.
//!
//! Each dispatcher extracts the request once (so the query string can
//! be inspected before committing to a body type) and hands off to the
//! already-written per-operation handler, constructing that handler's
//! own extractor types by hand — `State`, `Path` and `Query` are plain
//! tuple structs, so calling a handler directly like this is no
//! different from axum calling it for you.

use crate::error::S3Error;
use crate::handlers::{multipart, object, supplychain};
use crate::state::AppState;
use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_BUFFERED_BODY: usize = 5 * 1024 * 1024 * 1024;

async fn buffer(body: Body) -> Result<Bytes, S3Error> {
    to_bytes(body, MAX_BUFFERED_BODY)
        .await
        .map_err(|e| S3Error::Internal(e.to_string()))
}

fn parse_u32(query: &HashMap<String, String>, key: &str) -> Result<u32, S3Error> {
    query
        .get(key)
        .ok_or_else(|| S3Error::InvalidArgument(format!("missing {key}")))?
        .parse()
        .map_err(|_| S3Error::InvalidArgument(format!("invalid {key}")))
}

fn get(query: &HashMap<String, String>, key: &str) -> Result<String, S3Error> {
    query.get(key).cloned().ok_or_else(|| S3Error::InvalidArgument(format!("missing {key}")))
}

pub async fn put_dispatch(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    if query.contains_key("uploadId") && query.contains_key("partNumber") {
        let params = multipart::UploadPartParams {
            upload_id: get(&query, "uploadId")?,
            part_number: parse_u32(&query, "partNumber")?,
        };
        let bytes = buffer(body).await?;
        return multipart::upload_part(State(state), Path((bucket, key)), Query(params), bytes)
            .await
            .map(IntoResponse::into_response);
    }

    if query.contains_key("sbom") {
        let params = supplychain::SbomParams { format: get(&query, "format")?, version: get(&query, "version")? };
        let bytes = buffer(body).await?;
        return supplychain::put_sbom(State(state), Path((bucket, key)), Query(params), bytes)
            .await
            .map(IntoResponse::into_response);
    }

    object::put_object(State(state), Path((bucket, key)), headers, body).await
}

pub async fn get_dispatch(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, S3Error> {
    if query.contains_key("verify") {
        return supplychain::verify(State(state), Path((bucket, key)))
            .await
            .map(IntoResponse::into_response);
    }
    if query.contains_key("sbom") {
        return supplychain::get_sbom(State(state), Path((bucket, key)))
            .await
            .map(IntoResponse::into_response);
    }
    if query.contains_key("attestations") {
        return supplychain::list_attestations(State(state), Path((bucket, key)))
            .await
            .map(IntoResponse::into_response);
    }

    object::get_object(State(state), Path((bucket, key)), headers).await
}

pub async fn post_dispatch(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    if query.contains_key("uploads") {
        return multipart::initiate_multipart(State(state), Path((bucket, key)), headers)
            .await
            .map(IntoResponse::into_response);
    }

    if query.contains_key("sign") {
        let params = supplychain::SignParams { signer: query.get("signer").cloned() };
        return supplychain::sign(State(state), Path((bucket, key)), Query(params))
            .await
            .map(IntoResponse::into_response);
    }

    if query.contains_key("attestation") {
        let params = supplychain::AttestationParams {
            attestation_type: get(&query, "type")?,
            predicate_type: get(&query, "predicateType")?,
        };
        let bytes = buffer(body).await?;
        let predicate: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| S3Error::InvalidArgument(format!("invalid predicate JSON: {e}")))?;
        return supplychain::add_attestation(State(state), Path((bucket, key)), Query(params), axum::Json(predicate))
            .await
            .map(IntoResponse::into_response);
    }

    if query.contains_key("uploadId") {
        let params = multipart::CompleteParams { upload_id: get(&query, "uploadId")? };
        let bytes = buffer(body).await?;
        return multipart::complete_multipart(State(state), Path((bucket, key)), Query(params), bytes).await;
    }

    Err(S3Error::InvalidArgument("unsupported POST query".to_string()))
}

pub async fn delete_dispatch(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, S3Error> {
    if let Some(upload_id) = query.get("uploadId").cloned() {
        let params = multipart::CompleteParams { upload_id };
        return multipart::abort_multipart(State(state), Path((bucket, key)), Query(params))
            .await
            .map(IntoResponse::into_response);
    }

    object::delete_object(State(state), Path((bucket, key)))
        .await
        .map(IntoResponse::into_response)
}
