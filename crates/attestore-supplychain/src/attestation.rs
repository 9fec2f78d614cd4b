//! Attestations are opaque, typed JSON predicates attached to an
//! artifact — the store does not interpret the predicate body, only
//! indexes it by artifact and attestation type.

use attestore_common::Result;
use attestore_meta_store::{Attestation, AttestationType, MetaStore};
use chrono::Utc;
use serde_json::Value;

pub async fn add_attestation(
    meta_store: &MetaStore,
    artifact_id: &str,
    attestation_type: AttestationType,
    predicate_type: &str,
    predicate: Value,
) -> Result<Attestation> {
    let attestation = Attestation {
        id: uuid::Uuid::new_v4(),
        artifact_id: artifact_id.to_string(),
        attestation_type,
        predicate,
        predicate_type: predicate_type.to_string(),
        created_at: Utc::now(),
    };
    meta_store.put_attestation(attestation).await
}

pub async fn list_attestations(meta_store: &MetaStore, artifact_id: &str) -> Result<Vec<Attestation>> {
    meta_store.list_attestations(artifact_id).await
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
    async fn add_then_list_roundtrips() {
        let store = store().await;
        add_attestation(
            &store,
            "bucket/key",
            AttestationType::Build,
            "https://slsa.dev/provenance/v1",
            serde_json::json!({"builder": {"id": "ci"}}),
        )
        .await
        .unwrap();
        add_attestation(
            &store,
            "bucket/key",
            AttestationType::Scan,
            "https://example.com/scan/v1",
            serde_json::json!({"vulnerabilities": []}),
        )
        .await
        .unwrap();

        let all = list_attestations(&store, "bucket/key").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn list_for_unknown_artifact_is_empty() {
        let store = store().await;
        assert!(list_attestations(&store, "bucket/missing").await.unwrap().is_empty());
    }
}
