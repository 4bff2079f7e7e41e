//! 审计日志存储模块

pub mod sqlite_audit_storage;

pub use sqlite_audit_storage::SqliteAuditStorage;
