//! Access policy storage. Evaluation (deny-wins matching) lives in
//! `attestore-auth`; this module only persists the records.

use crate::store::{decode, encode, MetaStore};
use crate::tables::POLICIES;
use crate::types::Policy;
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};

impl MetaStore {
    pub async fn put_policy(&self, policy: Policy) -> Result<Policy> {
        let encoded = encode(&policy)?;
        let db = self.db.clone();
        let id = policy.id.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(POLICIES)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                table
                    .insert(id.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))??;
        Ok(policy)
    }

    pub async fn get_policy(&self, id: &str) -> Result<Policy> {
        let db = self.db.clone();
        let id = id.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(POLICIES)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let value = table
                .get(id.as_str())
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                .ok_or_else(|| Error::not_found(format!("policy {id} does not exist")))?;
            decode(value.value())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn delete_policy(&self, id: &str) -> Result<()> {
        let db = self.db.clone();
        let id = id.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(POLICIES)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                if table
                    .remove(id.as_str())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                    .is_none()
                {
                    return Err(Error::not_found(format!("policy {id} does not exist")));
                }
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    pub async fn list_policies(&self) -> Result<Vec<Policy>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(POLICIES)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let mut policies = Vec::new();
            for entry in table
                .iter()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
            {
                let (_, value) =
                    entry.map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                policies.push(decode(value.value())?);
            }
            Ok(policies)
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Effect;

    async fn store() -> MetaStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.redb");
        let store = MetaStore::open(&path).await.unwrap();
        std::mem::forget(dir);
        store
    }

    fn policy(id: &str) -> Policy {
        Policy {
            id: id.to_string(),
            name: format!("policy-{id}"),
            resource: "bucket/*".to_string(),
            actions: vec![crate::types::Action::Read],
            effect: Effect::Allow,
            principals: vec!["alice".to_string()],
            condition: None,
        }
    }

    #[tokio::test]
    async fn put_get_delete_list_roundtrip() {
        let store = store().await;
        store.put_policy(policy("p1")).await.unwrap();
        assert_eq!(store.get_policy("p1").await.unwrap().name, "policy-p1");
        assert_eq!(store.list_policies().await.unwrap().len(), 1);
        store.delete_policy("p1").await.unwrap();
        assert!(store.get_policy("p1").await.is_err());
    }
}
