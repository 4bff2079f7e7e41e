//! Nonce 存储模块
//!
//! 记录已使用的 nonce，防止重放攻击

pub mod sqlite_nonce_storage;

pub use sqlite_nonce_storage::SqliteNonceStorage;
