//! SQLite Nonce 存储实现
//!
//! 提供基于 SQLite 的 Nonce 存储功能实现，使用 sqlx 提供异步支持。
//! nonce 是表主键，并发插入同一个 nonce 时由 SQLite 的唯一约束保证只有一个成功。

use anyhow::Result;
use async_trait::async_trait;
use gate::storage::{NonceStore, StoreError};
use gate::types::NonceRecord;
use sqlx::sqlite::SqlitePool;
use std::path::Path;
use tracing::debug;

use crate::storage::db::Database;

/// A sqlx-based implementation of [`NonceStore`]
#[derive(Clone)]
pub struct SqliteNonceStorage {
    pool: SqlitePool,
}

impl SqliteNonceStorage {
    /// 基于已打开的数据库创建，与审计日志共享连接池
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.get_pool().clone(),
        }
    }

    /// 打开 `{db_path}/macgate.db` 并创建存储实例
    pub async fn new_async<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let database = Database::new(db_path).await?;
        Ok(Self::new(&database))
    }

    /// 查询一条 nonce 记录
    pub async fn get(&self, nonce: &str) -> Result<Option<NonceRecord>, StoreError> {
        let row = sqlx::query_as::<_, (String, i64)>(
            "SELECT nonce, used_at FROM nonces WHERE nonce = ?",
        )
        .bind(nonce)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(|(nonce, used_at)| NonceRecord { nonce, used_at }))
    }
}

fn storage_error(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl NonceStore for SqliteNonceStorage {
    async fn exists(&self, nonce: &str) -> Result<bool, StoreError> {
        Ok(self.get(nonce).await?.is_some())
    }

    async fn insert(&self, nonce: &str, used_at: i64) -> Result<(), StoreError> {
        let result = sqlx::query("INSERT INTO nonces (nonce, used_at) VALUES (?, ?)")
            .bind(nonce)
            .bind(used_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!("Nonce already present in database");
                Err(StoreError::Duplicate)
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nonces")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(total.0 as u64)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_basic_storage() {
        let temp_dir = tempdir().unwrap();
        let storage = SqliteNonceStorage::new_async(temp_dir.path())
            .await
            .unwrap();

        assert!(!storage.exists("test_nonce").await.unwrap());
        storage.insert("test_nonce", 1_700_000_000).await.unwrap();

        let record = storage.get("test_nonce").await.unwrap().unwrap();
        assert_eq!(record.nonce, "test_nonce");
        assert_eq!(record.used_at, 1_700_000_000);
        assert!(storage.exists("test_nonce").await.unwrap());

        // Duplicate should fail and keep the first record
        assert_eq!(
            storage.insert("test_nonce", 1_700_000_100).await,
            Err(StoreError::Duplicate)
        );
        let record = storage.get("test_nonce").await.unwrap().unwrap();
        assert_eq!(record.used_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_count() {
        let temp_dir = tempdir().unwrap();
        let storage = SqliteNonceStorage::new_async(temp_dir.path())
            .await
            .unwrap();

        storage.insert("n1", 1).await.unwrap();
        storage.insert("n2", 2).await.unwrap();

        assert_eq!(storage.count().await.unwrap(), 2);
        assert_eq!(storage.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_nonces_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        {
            let storage = SqliteNonceStorage::new_async(temp_dir.path())
                .await
                .unwrap();
            storage.insert("persisted", 42).await.unwrap();
        }

        let storage = SqliteNonceStorage::new_async(temp_dir.path())
            .await
            .unwrap();
        assert!(storage.exists("persisted").await.unwrap());
        assert_eq!(
            storage.insert("persisted", 43).await,
            Err(StoreError::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_concurrent_insert_single_winner() {
        let temp_dir = tempdir().unwrap();
        let storage = Arc::new(
            SqliteNonceStorage::new_async(temp_dir.path())
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage.insert("contended", i).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => winners += 1,
                Err(e) => assert_eq!(e, StoreError::Duplicate),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(storage.count().await.unwrap(), 1);
    }
}
