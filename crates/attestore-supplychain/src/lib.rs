//! Supply-chain metadata: artifact signing and verification, SBOM
//! attachment, and attestation records. Each operation delegates
//! persistence to the metadata store and keeps its own module's
//! cryptography or indexing concerns self-contained.

pub mod attestation;
pub mod sbom;
pub mod signing;

pub use attestation::{add_attestation, list_attestations};
pub use sbom::{attach_sbom, get_sbom};
pub use signing::{verify_signatures, ArtifactVerification, SignatureVerification, SigningAuthority};

use attestore_common::Result;
use attestore_meta_store::{MetaStore, Signature};

/// Signs an artifact's digest with the process's signing key and
/// persists the resulting [`Signature`].
pub async fn sign_artifact(
    meta_store: &MetaStore,
    authority: &SigningAuthority,
    artifact_id: &str,
    digest: &str,
    signer: &str,
) -> Result<Signature> {
    let signature = authority.sign_artifact(artifact_id, digest, signer)?;
    meta_store.put_signature(signature).await
}

/// Loads every signature recorded for an artifact and verifies each
/// against the artifact's current digest.
pub async fn verify_artifact(
    meta_store: &MetaStore,
    artifact_id: &str,
    current_digest: &str,
) -> Result<ArtifactVerification> {
    let signatures = meta_store.list_signatures(artifact_id).await?;
    Ok(verify_signatures(current_digest, &signatures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store() -> MetaStore {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.redb");
        std::mem::forget(dir);
        MetaStore::open(path).await.unwrap()
    }

    #[tokio::test]
    async fn sign_and_verify_artifact_end_to_end() {
        let store = store().await;
        let authority = SigningAuthority::generate().unwrap();
        let digest = attestore_common::types::sha256_hex(b"artifact bytes");

        sign_artifact(&store, &authority, "bucket/key", &digest, "ci@example.com")
            .await
            .unwrap();

        let verification = verify_artifact(&store, "bucket/key", &digest).await.unwrap();
        assert!(verification.verified);
        assert_eq!(verification.signatures.len(), 1);
    }

    #[tokio::test]
    async fn verify_unsigned_artifact_is_unverified() {
        let store = store().await;
        let verification = verify_artifact(&store, "bucket/unsigned", "abc").await.unwrap();
        assert!(!verification.verified);
        assert!(verification.signatures.is_empty());
    }
}
