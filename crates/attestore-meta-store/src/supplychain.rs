//! Supply-chain record storage: signatures and attestations are
//! multi-valued per artifact and tracked through a secondary index;
//! SBOMs are latest-wins, one record per artifact.

use crate::store::{decode, encode, MetaStore};
use crate::tables::{
    ATTESTATIONS, ATTESTATIONS_BY_ARTIFACT, SBOMS, SBOM_BY_ARTIFACT, SIGNATURES,
    SIGNATURES_BY_ARTIFACT,
};
use crate::types::{Attestation, Sbom, Signature};
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use chrono::Utc;

fn index_key(artifact_id: &str, record_id: &uuid::Uuid) -> String {
    format!("{artifact_id}\0{record_id}")
}

impl MetaStore {
    pub async fn put_signature(&self, signature: Signature) -> Result<Signature> {
        let encoded = encode(&signature)?;
        let index_key = index_key(&signature.artifact_id, &signature.id);
        let id = signature.id;
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(SIGNATURES)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                table
                    .insert(id.to_string().as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let mut by_artifact = txn
                    .open_table(SIGNATURES_BY_ARTIFACT)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                by_artifact
                    .insert(index_key.as_str(), &[][..])
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))??;
        Ok(signature)
    }

    pub async fn list_signatures(&self, artifact_id: &str) -> Result<Vec<Signature>> {
        let db = self.db.clone();
        let prefix = format!("{artifact_id}\0");
        tokio::task::spawn_blocking(move || {
            let read = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let by_artifact = read
                .open_table(SIGNATURES_BY_ARTIFACT)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let signatures = read
                .open_table(SIGNATURES)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let mut out = Vec::new();
            for entry in by_artifact
                .range(prefix.as_str()..)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
            {
                let (index_key, _) =
                    entry.map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let index_key = index_key.value();
                if !index_key.starts_with(prefix.as_str()) {
                    break;
                }
                let signature_id = &index_key[prefix.len()..];
                if let Some(value) = signatures
                    .get(signature_id)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                {
                    out.push(decode(value.value())?);
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn put_sbom(&self, mut sbom: Sbom) -> Result<Sbom> {
        let db = self.db.clone();
        let artifact_id = sbom.artifact_id.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut by_artifact = txn
                    .open_table(SBOM_BY_ARTIFACT)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let mut sboms = txn
                    .open_table(SBOMS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let now = Utc::now();
                if let Some(existing_id) = by_artifact
                    .get(artifact_id.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                {
                    let existing_id = existing_id.value().to_owned();
                    if let Some(existing) = sboms
                        .get(existing_id.as_str())
                        .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                    {
                        let existing: Sbom = decode(existing.value())?;
                        sbom.created_at = existing.created_at;
                        sboms
                            .remove(existing_id.as_str())
                            .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                    }
                } else {
                    sbom.created_at = now;
                }
                sbom.updated_at = now;
                let encoded = encode(&sbom)?;
                let id_string = sbom.id.to_string();
                sboms
                    .insert(id_string.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                by_artifact
                    .insert(artifact_id.as_str(), id_string.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))??;
        Ok(sbom)
    }

    pub async fn get_sbom(&self, artifact_id: &str) -> Result<Sbom> {
        let db = self.db.clone();
        let artifact_id = artifact_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let by_artifact = txn
                .open_table(SBOM_BY_ARTIFACT)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let sboms = txn
                .open_table(SBOMS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let id = by_artifact
                .get(artifact_id.as_str())
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                .ok_or_else(|| Error::not_found(format!("no sbom for {artifact_id}")))?
                .value()
                .to_owned();
            let value = sboms
                .get(id.as_str())
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                .ok_or_else(|| Error::not_found(format!("no sbom for {artifact_id}")))?;
            decode(value.value())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn put_attestation(&self, attestation: Attestation) -> Result<Attestation> {
        let encoded = encode(&attestation)?;
        let index_key = index_key(&attestation.artifact_id, &attestation.id);
        let id = attestation.id;
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(ATTESTATIONS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                table
                    .insert(id.to_string().as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let mut by_artifact = txn
                    .open_table(ATTESTATIONS_BY_ARTIFACT)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                by_artifact
                    .insert(index_key.as_str(), &[][..])
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))??;
        Ok(attestation)
    }

    pub async fn list_attestations(&self, artifact_id: &str) -> Result<Vec<Attestation>> {
        let db = self.db.clone();
        let prefix = format!("{artifact_id}\0");
        tokio::task::spawn_blocking(move || {
            let read = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let by_artifact = read
                .open_table(ATTESTATIONS_BY_ARTIFACT)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let attestations = read
                .open_table(ATTESTATIONS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let mut out = Vec::new();
            for entry in by_artifact
                .range(prefix.as_str()..)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
            {
                let (index_key, _) =
                    entry.map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let index_key = index_key.value();
                if !index_key.starts_with(prefix.as_str()) {
                    break;
                }
                let attestation_id = &index_key[prefix.len()..];
                if let Some(value) = attestations
                    .get(attestation_id)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                {
                    out.push(decode(value.value())?);
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttestationType, SbomFormat};

    async fn store() -> MetaStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.redb");
        let store = MetaStore::open(&path).await.unwrap();
        std::mem::forget(dir);
        store
    }

    fn signature(artifact_id: &str) -> Signature {
        Signature {
            id: uuid::Uuid::new_v4(),
            artifact_id: artifact_id.to_string(),
            algorithm: "RS256".to_string(),
            signature: vec![1, 2, 3],
            public_key_pem: "-----BEGIN PUBLIC KEY-----".to_string(),
            signer: "ci@example.com".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn signatures_list_by_artifact_only() {
        let store = store().await;
        store.put_signature(signature("b/k1")).await.unwrap();
        store.put_signature(signature("b/k1")).await.unwrap();
        store.put_signature(signature("b/k2")).await.unwrap();
        assert_eq!(store.list_signatures("b/k1").await.unwrap().len(), 2);
        assert_eq!(store.list_signatures("b/k2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sbom_put_is_latest_wins() {
        let store = store().await;
        let first = Sbom {
            id: uuid::Uuid::new_v4(),
            artifact_id: "b/k".to_string(),
            format: SbomFormat::Spdx,
            version: "1".to_string(),
            content: b"{}".to_vec(),
            content_type: "application/json".to_string(),
            sha256: attestore_common::types::sha256_hex(b"{}"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.put_sbom(first.clone()).await.unwrap();
        let second = Sbom {
            id: uuid::Uuid::new_v4(),
            version: "2".to_string(),
            ..first
        };
        store.put_sbom(second).await.unwrap();
        let fetched = store.get_sbom("b/k").await.unwrap();
        assert_eq!(fetched.version, "2");
    }

    #[tokio::test]
    async fn attestations_list_by_artifact() {
        let store = store().await;
        let a = Attestation {
            id: uuid::Uuid::new_v4(),
            artifact_id: "b/k".to_string(),
            attestation_type: AttestationType::Build,
            predicate: serde_json::json!({"builder": "ci"}),
            predicate_type: "https://slsa.dev/provenance/v1".to_string(),
            created_at: Utc::now(),
        };
        store.put_attestation(a).await.unwrap();
        assert_eq!(store.list_attestations("b/k").await.unwrap().len(), 1);
        assert_eq!(store.list_attestations("other").await.unwrap().len(), 0);
    }
}
