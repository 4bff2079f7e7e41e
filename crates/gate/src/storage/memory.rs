//! 内存存储实现
//!
//! 进程重启后数据丢失，仅用于测试和嵌入场景

use super::{AuditStore, NonceStore, StoreError};
use crate::types::{AuditEntry, AuditRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

/// 内存 nonce 存储
#[derive(Debug, Default)]
pub struct MemoryNonceStore {
    nonces: Mutex<HashMap<String, i64>>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取 nonce 的使用时间
    pub async fn used_at(&self, nonce: &str) -> Option<i64> {
        self.nonces.lock().await.get(nonce).copied()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn exists(&self, nonce: &str) -> Result<bool, StoreError> {
        Ok(self.nonces.lock().await.contains_key(nonce))
    }

    async fn insert(&self, nonce: &str, used_at: i64) -> Result<(), StoreError> {
        let mut nonces = self.nonces.lock().await;
        if nonces.contains_key(nonce) {
            return Err(StoreError::Duplicate);
        }
        nonces.insert(nonce.to_string(), used_at);
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.nonces.lock().await.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// 内存审计日志存储
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<i64, StoreError> {
        let mut records = self.records.write().await;
        let id = records.len() as i64 + 1;
        records.push(entry.into_record(id));
        Ok(id)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AuditRecord>, StoreError> {
        let records = self.records.read().await;
        let mut rows: Vec<AuditRecord> = records.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(reason: &str, created_at: i64) -> AuditEntry {
        AuditEntry {
            payload: "{}".to_string(),
            client_hmac: None,
            ok: false,
            reason: reason.to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_duplicate_nonce_rejected() {
        let store = MemoryNonceStore::new();
        store.insert("abc", 100).await.unwrap();

        assert_eq!(store.insert("abc", 101).await, Err(StoreError::Duplicate));
        // 第二次失败不影响第一次的记录
        assert_eq!(store.used_at("abc").await, Some(100));
        assert!(store.exists("abc").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_single_winner() {
        let store = Arc::new(MemoryNonceStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.insert("race", i).await.is_ok() },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_limited() {
        let store = MemoryAuditStore::new();
        store.append(entry("a", 10)).await.unwrap();
        store.append(entry("b", 30)).await.unwrap();
        store.append(entry("c", 30)).await.unwrap();
        store.append(entry("d", 20)).await.unwrap();

        let rows = store.recent(3).await.unwrap();
        let reasons: Vec<&str> = rows.iter().map(|r| r.reason.as_str()).collect();
        assert_eq!(reasons, vec!["c", "b", "d"]);
    }
}
