//! 存储模块
//!
//! 提供数据存储功能：nonce 集合与审计日志，两者共用一个 SQLite 数据库

pub mod audit;
pub mod db;
pub mod nonce;

pub use audit::SqliteAuditStorage;
pub use db::Database;
pub use nonce::SqliteNonceStorage;
