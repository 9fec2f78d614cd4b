//! Supply-chain sub-resources, dispatched by query string on the object
//! path: `?sign`, `?verify`, `?sbom`, `?attestation`, `?attestations`.
//! Grounded in the same query-parameter dispatch the bucket/object routes
//! already use for `uploads`/`uploadId`/`partNumber`.

use crate::error::S3Error;
use crate::state::AppState;
use attestore_meta_store::{AttestationType, SbomFormat};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

fn artifact_id(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
}

#[derive(Debug, Deserialize)]
pub struct SignParams {
    pub(crate) signer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignatureResponse {
    pub id: uuid::Uuid,
    pub algorithm: String,
    pub signer: String,
}

pub async fn sign(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<SignParams>,
) -> Result<impl IntoResponse, S3Error> {
    let start = Instant::now();
    let artifact = state.meta_store.get_artifact(&bucket, &key).await?;
    let signer = params.signer.unwrap_or_else(|| "anonymous".to_string());

    let result = attestore_supplychain::sign_artifact(
        &state.meta_store,
        &state.signing_authority,
        &artifact_id(&bucket, &key),
        &artifact.digest,
        &signer,
    )
    .await;

    let status = if result.is_ok() { "success" } else { "error" };
    crate::metrics::record_signing(status, start.elapsed());
    let signature = result?;

    Ok((
        StatusCode::OK,
        Json(SignatureResponse { id: signature.id, algorithm: signature.algorithm, signer: signature.signer }),
    ))
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub signatures: Vec<VerifySignatureResponse>,
}

#[derive(Debug, Serialize)]
pub struct VerifySignatureResponse {
    pub signature_id: uuid::Uuid,
    pub signer: String,
    pub verified: bool,
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, S3Error> {
    let start = Instant::now();
    let artifact = state.meta_store.get_artifact(&bucket, &key).await?;

    let result = attestore_supplychain::verify_artifact(&state.meta_store, &artifact_id(&bucket, &key), &artifact.digest).await;
    let status = match &result {
        Ok(v) if v.verified => "verified",
        Ok(_) => "unverified",
        Err(_) => "error",
    };
    crate::metrics::record_verification(status, start.elapsed());
    let verification = result?;

    Ok((
        StatusCode::OK,
        Json(VerifyResponse {
            verified: verification.verified,
            signatures: verification
                .signatures
                .into_iter()
                .map(|s| VerifySignatureResponse { signature_id: s.signature_id, signer: s.signer, verified: s.verified })
                .collect(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SbomParams {
    pub(crate) format: String,
    pub(crate) version: String,
}

pub async fn put_sbom(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<SbomParams>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, S3Error> {
    let start = Instant::now();
    let format = match params.format.to_ascii_lowercase().as_str() {
        "spdx" => SbomFormat::Spdx,
        "cyclonedx" => SbomFormat::Cyclonedx,
        other => return Err(S3Error::InvalidArgument(format!("unknown SBOM format: {other}"))),
    };

    let result = attestore_supplychain::attach_sbom(
        &state.meta_store,
        &artifact_id(&bucket, &key),
        format,
        &params.version,
        body.to_vec(),
        "application/json",
    )
    .await;
    let status = if result.is_ok() { "success" } else { "error" };
    crate::metrics::record_sbom_operation("attach", &params.format, status, start.elapsed());
    let sbom = result?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "id": sbom.id, "sha256": sbom.sha256 }))))
}

pub async fn get_sbom(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, S3Error> {
    let start = Instant::now();
    let result = attestore_supplychain::get_sbom(&state.meta_store, &artifact_id(&bucket, &key)).await;
    let status = if result.is_ok() { "success" } else { "error" };
    let sbom = result?;
    crate::metrics::record_sbom_operation("get", "unknown", status, start.elapsed());

    match sbom {
        Some(sbom) => Ok((
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, sbom.content_type.clone())],
            sbom.content,
        )
            .into_response()),
        None => Err(S3Error::NoSuchKey(format!("no SBOM attached to {key}"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct AttestationParams {
    #[serde(rename = "type")]
    pub(crate) attestation_type: String,
    #[serde(rename = "predicateType")]
    pub(crate) predicate_type: String,
}

pub async fn add_attestation(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<AttestationParams>,
    Json(predicate): Json<serde_json::Value>,
) -> Result<impl IntoResponse, S3Error> {
    let start = Instant::now();
    let attestation_type = match params.attestation_type.to_ascii_lowercase().as_str() {
        "build" => AttestationType::Build,
        "test" => AttestationType::Test,
        "deploy" => AttestationType::Deploy,
        "scan" => AttestationType::Scan,
        "provenance" => AttestationType::Provenance,
        other => return Err(S3Error::InvalidArgument(format!("unknown attestation type: {other}"))),
    };

    let result = attestore_supplychain::add_attestation(
        &state.meta_store,
        &artifact_id(&bucket, &key),
        attestation_type,
        &params.predicate_type,
        predicate,
    )
    .await;
    let status = if result.is_ok() { "success" } else { "error" };
    crate::metrics::record_attestation_operation("add", &params.attestation_type, status, start.elapsed());
    let attestation = result?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "id": attestation.id }))))
}

pub async fn list_attestations(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, S3Error> {
    let start = Instant::now();
    let result = attestore_supplychain::list_attestations(&state.meta_store, &artifact_id(&bucket, &key)).await;
    let status = if result.is_ok() { "success" } else { "error" };
    crate::metrics::record_attestation_operation("list", "all", status, start.elapsed());
    let attestations = result?;

    Ok((StatusCode::OK, Json(attestations)))
}
