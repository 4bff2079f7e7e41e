//! SQLite 审计日志存储实现

use anyhow::Result;
use async_trait::async_trait;
use gate::storage::{AuditStore, StoreError};
use gate::types::{AuditEntry, AuditRecord};
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use crate::storage::db::Database;

type MessageRow = (i64, String, Option<String>, bool, Option<String>, i64);

/// A sqlx-based implementation of [`AuditStore`]
#[derive(Clone)]
pub struct SqliteAuditStorage {
    pool: SqlitePool,
}

impl SqliteAuditStorage {
    /// 基于已打开的数据库创建，与 nonce 存储共享连接池
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
}

#[async_trait]
impl AuditStore for SqliteAuditStorage {
    async fn append(&self, entry: AuditEntry) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO messages (payload, client_hmac, ok, reason, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.payload)
        .bind(&entry.client_hmac)
        .bind(entry.ok)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AuditRecord>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, payload, client_hmac, ok, reason, created_at FROM messages
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, payload, client_hmac, ok, reason, created_at)| AuditRecord {
                    id,
                    payload,
                    client_hmac,
                    ok,
                    reason: reason.unwrap_or_default(),
                    created_at,
                },
            )
            .collect())
    }
}
