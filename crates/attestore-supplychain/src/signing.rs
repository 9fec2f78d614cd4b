//! RSA-2048 artifact signing and verification.
//!
//! `SignArtifact` signs `sha256(artifact.digest)` rather than the
//! artifact bytes themselves — the artifact's own content digest,
//! re-hashed, is the thing being attested to. This is self-referential
//! by design (see the design notes ledger) rather than a mistake:
//! signing the already-computed digest lets the signer and verifier
//! agree on a fixed-size input without re-reading the object body.

use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use attestore_meta_store::Signature;
use rsa::pkcs1v15::Pkcs1v15Sign;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

const KEY_BITS: usize = 2048;

/// Hashes the artifact's content digest, producing the fixed-size input
/// every signature is computed and verified against.
fn signing_input(artifact_digest: &str) -> [u8; 32] {
    Sha256::digest(artifact_digest.as_bytes()).into()
}

/// Holds the process's signing key pair. Generated fresh at startup
/// unless a key was supplied via configuration.
pub struct SigningAuthority {
    private_key: RsaPrivateKey,
    public_key_pem: String,
}

impl SigningAuthority {
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| Error::new(ErrorCode::Internal, format!("key generation failed: {e}")))?;
        Self::from_private_key(private_key)
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| Error::invalid_config(format!("invalid signing key: {e}")))?;
        Self::from_private_key(private_key)
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Result<Self> {
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::new(ErrorCode::Internal, format!("failed to encode public key: {e}")))?;
        Ok(Self { private_key, public_key_pem })
    }

    #[must_use]
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Signs `sha256(digest)` and returns a ready-to-persist [`Signature`]
    /// record; the caller is responsible for storing it.
    pub fn sign_artifact(&self, artifact_id: &str, digest: &str, signer: &str) -> Result<Signature> {
        let hash = signing_input(digest);
        let signature_bytes = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &hash)
            .map_err(|e| Error::new(ErrorCode::Internal, format!("signing failed: {e}")))?;

        Ok(Signature {
            id: uuid::Uuid::new_v4(),
            artifact_id: artifact_id.to_string(),
            algorithm: "RS256".to_string(),
            signature: signature_bytes,
            public_key_pem: self.public_key_pem.clone(),
            signer: signer.to_string(),
            created_at: chrono::Utc::now(),
        })
    }
}

/// Per-signature verification outcome.
#[derive(Debug, Clone)]
pub struct SignatureVerification {
    pub signature_id: uuid::Uuid,
    pub signer: String,
    pub verified: bool,
}

/// Overall verdict for an artifact: true iff at least one signature
/// exists and every signature verifies.
#[derive(Debug, Clone)]
pub struct ArtifactVerification {
    pub verified: bool,
    pub signatures: Vec<SignatureVerification>,
}

/// Verifies every signature on record against the artifact's current
/// content digest. Each signature carries its own public key, so no
/// shared signing authority is needed to verify.
#[must_use]
pub fn verify_signatures(current_digest: &str, signatures: &[Signature]) -> ArtifactVerification {
    let hash = signing_input(current_digest);
    let mut results = Vec::with_capacity(signatures.len());

    for sig in signatures {
        let verified = verify_one(&hash, sig);
        results.push(SignatureVerification {
            signature_id: sig.id,
            signer: sig.signer.clone(),
            verified,
        });
    }

    let verified = !results.is_empty() && results.iter().all(|r| r.verified);
    ArtifactVerification { verified, signatures: results }
}

fn verify_one(hash: &[u8; 32], sig: &Signature) -> bool {
    let Ok(public_key) = RsaPublicKey::from_public_key_pem(&sig.public_key_pem) else {
        return false;
    };
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), hash, &sig.signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let authority = SigningAuthority::generate().unwrap();
        let digest = attestore_common::types::sha256_hex(b"artifact bytes");
        let sig = authority.sign_artifact("bucket/key", &digest, "ci@example.com").unwrap();
        let result = verify_signatures(&digest, std::slice::from_ref(&sig));
        assert!(result.verified);
        assert_eq!(result.signatures.len(), 1);
        assert!(result.signatures[0].verified);
    }

    #[test]
    fn verify_fails_if_digest_changed() {
        let authority = SigningAuthority::generate().unwrap();
        let digest = attestore_common::types::sha256_hex(b"artifact bytes");
        let sig = authority.sign_artifact("bucket/key", &digest, "ci@example.com").unwrap();
        let tampered_digest = attestore_common::types::sha256_hex(b"different bytes");
        let result = verify_signatures(&tampered_digest, std::slice::from_ref(&sig));
        assert!(!result.verified);
    }

    #[test]
    fn no_signatures_is_not_verified() {
        let result = verify_signatures("abc", &[]);
        assert!(!result.verified);
    }

    #[test]
    fn one_bad_signature_fails_the_whole_artifact() {
        let authority = SigningAuthority::generate().unwrap();
        let other_authority = SigningAuthority::generate().unwrap();
        let digest = attestore_common::types::sha256_hex(b"artifact bytes");
        let good = authority.sign_artifact("bucket/key", &digest, "ci@example.com").unwrap();
        let mut bad = other_authority.sign_artifact("bucket/key", &digest, "mallory").unwrap();
        bad.signature[0] ^= 0xFF;
        let result = verify_signatures(&digest, &[good, bad]);
        assert!(!result.verified);
    }
}
