//! Records persisted by the metadata store, matching the data model:
//! [`Bucket`], [`Artifact`], [`MultipartUpload`]/[`MultipartPart`],
//! [`Policy`], [`AuditLog`], [`Signature`], [`Sbom`], [`Attestation`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level namespace for artifacts. Counters (`object_count`,
/// `total_size`) are maintained by the S3 handler as part of each
/// object write/delete, not by this store or the backend — this struct is
/// just the record shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub object_count: i64,
    pub total_size: i64,
    /// Reserved — accepted and stored but never enforced.
    pub versioning: bool,
    pub tags: HashMap<String, String>,
    pub policy_id: Option<String>,
}

impl Bucket {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created_at: now,
            updated_at: now,
            object_count: 0,
            total_size: 0,
            versioning: false,
            tags: HashMap::new(),
            policy_id: None,
        }
    }
}

/// An object descriptor. Identity is `(bucket, key)`; the meta-store keys
/// it internally as `"{bucket}/{key}"` so prefix scans enumerate a bucket
/// in key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub bucket: String,
    pub key: String,
    /// sha256 of the bytes streamed during PUT, computed server-side.
    pub digest: String,
    pub size: i64,
    pub content_type: String,
    /// Hex digest used as the ETag (md5 of content, matching S3 client
    /// expectations even though integrity is tracked via `digest`/sha256).
    pub md5: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Backend-relative storage path/key.
    pub storage_path: String,
    pub metadata: HashMap<String, String>,
    pub is_multipart: bool,
    pub upload_id: Option<String>,
    pub signature_ids: Vec<String>,
    pub sbom_id: Option<String>,
    pub attestation_ids: Vec<String>,
}

impl Artifact {
    #[must_use]
    pub fn artifact_id(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

/// A multipart upload session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    pub initiated_at: DateTime<Utc>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    /// Ordered by `part_number` — callers should not assume insertion
    /// order is preserved; `MetaStore::put_multipart_part` re-sorts.
    pub parts: Vec<MultipartPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartPart {
    pub part_number: u32,
    pub etag: String,
    pub size: i64,
    pub digest: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A small-value summary of an in-progress multipart upload, kept under
/// its own key in `upload_progress` so a caller polling upload state
/// doesn't have to decode the full `MultipartUpload` (part list included)
/// out of `multipart_uploads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadProgress {
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    pub parts_received: u32,
    pub bytes_received: i64,
    pub updated_at: DateTime<Utc>,
}

impl UploadProgress {
    #[must_use]
    pub fn from_upload(upload: &MultipartUpload) -> Self {
        Self {
            upload_id: upload.upload_id.clone(),
            bucket: upload.bucket.clone(),
            key: upload.key.clone(),
            parts_received: upload.parts.len() as u32,
            bytes_received: upload.parts.iter().map(|p| p.size).sum(),
            updated_at: Utc::now(),
        }
    }
}

/// An access-control rule. No ordering significance between policies;
/// conflict resolution is deny-wins (see `attestore-auth::policy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub resource: String,
    pub actions: Vec<Action>,
    pub effect: Effect,
    pub principals: Vec<String>,
    pub condition: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
    List,
    Admin,
    /// `*` — matches any action.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// One audit entry. Stored under key `{unix-seconds}_{uuid}` so reverse
/// iteration yields newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    pub action: String,
    pub resource: String,
    pub method: String,
    pub status: u16,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub extra: HashMap<String, String>,
    pub error: Option<String>,
}

impl AuditLog {
    /// Key this log sorts under: `{unix-seconds}_{uuid}`.
    #[must_use]
    pub fn store_key(&self) -> String {
        format!("{}_{}", self.timestamp.timestamp(), self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SbomFormat {
    Spdx,
    Cyclonedx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationType {
    Build,
    Test,
    Deploy,
    Scan,
    Provenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub id: uuid::Uuid,
    pub artifact_id: String,
    pub algorithm: String,
    pub signature: Vec<u8>,
    pub public_key_pem: String,
    pub signer: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sbom {
    pub id: uuid::Uuid,
    pub artifact_id: String,
    pub format: SbomFormat,
    pub version: String,
    pub content: Vec<u8>,
    pub content_type: String,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub id: uuid::Uuid,
    pub artifact_id: String,
    #[serde(rename = "type")]
    pub attestation_type: AttestationType,
    pub predicate: serde_json::Value,
    pub predicate_type: String,
    pub created_at: DateTime<Utc>,
}
