//! 数据库连接和操作管理
//!
//! 提供基于 sqlx 的数据库连接池和表结构初始化

use crate::error::DatabaseError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// 数据库文件名
pub const DB_FILE_NAME: &str = "macgate.db";

/// 数据库管理器
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 创建新的数据库实例
    ///
    /// # Arguments
    /// * `path` - 数据库文件存储目录路径，必须已存在
    ///   主数据库文件将存储为 `{path}/macgate.db`
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let dir = path.as_ref();
        if !dir.is_dir() {
            return Err(DatabaseError::DirectoryNotFound {
                path: dir.display().to_string(),
            });
        }
        let db_file = dir.join(DB_FILE_NAME);

        // 创建连接选项并启用 WAL 模式
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_file.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        // 创建连接池
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let db = Self { pool };

        // 初始化数据库表结构
        db.initialize_schema().await?;
        info!("Database ready at {}", db_file.display());

        Ok(db)
    }

    /// 初始化数据库表结构
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        // 审计日志表
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL,
                client_hmac TEXT,
                ok INTEGER NOT NULL,
                reason TEXT,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // 已使用的 nonce，主键保证唯一
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS nonces (
                nonce TEXT PRIMARY KEY,
                used_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_created_at
             ON messages(created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 获取数据库连接池
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 执行 SQL 语句并返回影响的行数
    pub async fn execute(&self, sql: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let temp_dir = tempdir().unwrap();

        let db = Database::new(temp_dir.path()).await.unwrap();
        db.execute("INSERT INTO nonces (nonce, used_at) VALUES ('n1', 1)")
            .await
            .unwrap();
        drop(db);

        // 再次打开不会丢失数据
        let db = Database::new(temp_dir.path()).await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nonces")
            .fetch_one(db.get_pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
        assert!(temp_dir.path().join(DB_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let temp_dir = tempdir().unwrap();
        let result = Database::new(temp_dir.path().join("does-not-exist")).await;
        assert!(matches!(
            result,
            Err(DatabaseError::DirectoryNotFound { .. })
        ));
    }
}
