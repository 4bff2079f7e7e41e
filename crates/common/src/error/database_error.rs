//! 数据库相关错误类型
//!
//! 定义与数据库连接、查询相关的错误

use thiserror::Error;

/// 数据库相关错误
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}
