//! Audit log storage. Entries are keyed so iteration in reverse key
//! order yields newest-first; filtering by user/resource/time range is
//! done in memory since audit queries are low-volume and infrequent
//! compared to the object path.

use crate::store::{decode, encode, MetaStore};
use crate::tables::AUDIT_LOGS;
use crate::types::AuditLog;
use attestore_common::error::ErrorCode;
use attestore_common::{Error, Result};
use chrono::{DateTime, Utc};

impl MetaStore {
    pub async fn append_audit_log(&self, log: AuditLog) -> Result<()> {
        let key = log.store_key();
        let encoded = encode(&log)?;
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            {
                let mut table = txn
                    .open_table(AUDIT_LOGS)
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                table
                    .insert(key.as_str(), encoded.as_slice())
                    .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            }
            txn.commit()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }

    /// Returns up to `limit` audit entries matching the given filters,
    /// newest first. Any filter left `None` matches everything.
    pub async fn list_audit_logs(
        &self,
        user_id: Option<String>,
        resource: Option<String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<AuditLog>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let table = txn
                .open_table(AUDIT_LOGS)
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
            let mut matches = Vec::new();
            for entry in table
                .iter()
                .map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?
                .rev()
            {
                let (_, value) =
                    entry.map_err(|e| Error::new(ErrorCode::Internal, e.to_string()).with_source(e))?;
                let log: AuditLog = decode(value.value())?;
                if let Some(uid) = &user_id {
                    if &log.user_id != uid {
                        continue;
                    }
                }
                if let Some(res) = &resource {
                    if &log.resource != res {
                        continue;
                    }
                }
                if let Some(start) = start {
                    if log.timestamp < start {
                        continue;
                    }
                }
                if let Some(end) = end {
                    if log.timestamp > end {
                        continue;
                    }
                }
                matches.push(log);
                if matches.len() == limit {
                    break;
                }
            }
            Ok(matches)
        })
        .await
        .map_err(|e| Error::new(ErrorCode::Internal, format!("task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    async fn store() -> MetaStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.redb");
        let store = MetaStore::open(&path).await.unwrap();
        std::mem::forget(dir);
        store
    }

    fn log(user_id: &str, resource: &str) -> AuditLog {
        AuditLog {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            user_name: user_id.to_string(),
            action: "GetObject".to_string(),
            resource: resource.to_string(),
            method: "GET".to_string(),
            status: 200,
            client_ip: None,
            user_agent: None,
            extra: HashMap::new(),
            error: None,
        }
    }

    #[tokio::test]
    async fn newest_first_ordering() {
        let store = store().await;
        store.append_audit_log(log("alice", "b/k1")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        store.append_audit_log(log("alice", "b/k2")).await.unwrap();
        let logs = store
            .list_audit_logs(None, None, None, None, 10)
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].resource, "b/k2");
        assert_eq!(logs[1].resource, "b/k1");
    }

    #[tokio::test]
    async fn filters_by_user() {
        let store = store().await;
        store.append_audit_log(log("alice", "b/k1")).await.unwrap();
        store.append_audit_log(log("bob", "b/k2")).await.unwrap();
        let logs = store
            .list_audit_logs(Some("bob".to_string()), None, None, None, 10)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].user_id, "bob");
    }
}
