//! Embedded metadata store — buckets, artifacts, multipart uploads,
//! access policies, audit logs, and supply-chain records, all backed by
//! a single redb file. Namespace operations live in their own modules
//! (`bucket`, `object`, `multipart`, `policy`, `audit`, `supplychain`)
//! as `impl MetaStore` blocks so `store.rs` stays focused on opening the
//! database and the shared encode/decode helpers.

pub mod audit;
pub mod bucket;
pub mod multipart;
pub mod object;
pub mod policy;
pub mod store;
pub mod supplychain;
pub mod tables;
pub mod types;

pub use store::MetaStore;
pub use types::{
    Action, Artifact, Attestation, AttestationType, AuditLog, Bucket, Effect, MultipartPart,
    MultipartUpload, Policy, Sbom, SbomFormat, Signature, UploadProgress,
};
