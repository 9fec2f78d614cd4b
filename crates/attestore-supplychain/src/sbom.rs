//! SBOM attachment: stores the raw document alongside a sha256 computed
//! on ingest so later reads can be checked against tampering.

use attestore_common::error::ErrorCode;
use attestore_common::types::sha256_hex;
use attestore_common::Result;
use attestore_meta_store::{MetaStore, Sbom, SbomFormat};
use chrono::Utc;

pub async fn attach_sbom(
    meta_store: &MetaStore,
    artifact_id: &str,
    format: SbomFormat,
    version: &str,
    content: Vec<u8>,
    content_type: &str,
) -> Result<Sbom> {
    let sha256 = sha256_hex(&content);
    let now = Utc::now();
    let sbom = Sbom {
        id: uuid::Uuid::new_v4(),
        artifact_id: artifact_id.to_string(),
        format,
        version: version.to_string(),
        content,
        content_type: content_type.to_string(),
        sha256,
        created_at: now,
        updated_at: now,
    };
    meta_store.put_sbom(sbom.clone()).await?;
    Ok(sbom)
}

pub async fn get_sbom(meta_store: &MetaStore, artifact_id: &str) -> Result<Option<Sbom>> {
    match meta_store.get_sbom(artifact_id).await {
        Ok(sbom) => Ok(Some(sbom)),
        Err(e) if e.code == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e),
    }
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
    async fn attach_then_get_roundtrips_and_hashes() {
        let store = store().await;
        let sbom = attach_sbom(
            &store,
            "bucket/key",
            SbomFormat::Spdx,
            "2.3",
            b"{\"spdxVersion\":\"SPDX-2.3\"}".to_vec(),
            "application/spdx+json",
        )
        .await
        .unwrap();
        assert_eq!(sbom.sha256, sha256_hex(b"{\"spdxVersion\":\"SPDX-2.3\"}"));

        let fetched = get_sbom(&store, "bucket/key").await.unwrap().unwrap();
        assert_eq!(fetched.id, sbom.id);
        assert_eq!(fetched.version, "2.3");
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = store().await;
        assert!(get_sbom(&store, "bucket/missing").await.unwrap().is_none());
    }
}
