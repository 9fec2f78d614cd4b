//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

// S3 metadata
pub const BUCKETS: TableDefinition<&str, &[u8]> = TableDefinition::new("buckets");
// Key: "{bucket}/{key}", Value: bincode-encoded Artifact
pub const ARTIFACTS: TableDefinition<&str, &[u8]> = TableDefinition::new("artifacts");
pub const MULTIPART_UPLOADS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("multipart_uploads");
// Key: upload_id, Value: bincode-encoded UploadProgress. A secondary,
// small-value index over MULTIPART_UPLOADS so progress can be polled
// without decoding the (potentially large) part list.
pub const UPLOAD_PROGRESS: TableDefinition<&str, &[u8]> = TableDefinition::new("upload_progress");

// RBAC
pub const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("policies");

// Audit
// Key: "{unix_seconds}_{uuid}" so reverse iteration yields newest-first
pub const AUDIT_LOGS: TableDefinition<&str, &[u8]> = TableDefinition::new("audit_logs");

// Supply chain
pub const SIGNATURES: TableDefinition<&str, &[u8]> = TableDefinition::new("signatures");
// Key: "{artifact_id}\x00{signature_id}", Value: () — secondary index for
// listing signatures by artifact in insertion order.
pub const SIGNATURES_BY_ARTIFACT: TableDefinition<&str, &[u8]> =
    TableDefinition::new("signatures_by_artifact");
pub const SBOMS: TableDefinition<&str, &[u8]> = TableDefinition::new("sboms");
// Key: artifact_id, Value: sbom_id — latest-wins, one SBOM per artifact.
pub const SBOM_BY_ARTIFACT: TableDefinition<&str, &str> =
    TableDefinition::new("sbom_by_artifact");
pub const ATTESTATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("attestations");
// Key: "{artifact_id}\x00{attestation_id}", Value: ()
pub const ATTESTATIONS_BY_ARTIFACT: TableDefinition<&str, &[u8]> =
    TableDefinition::new("attestations_by_artifact");
