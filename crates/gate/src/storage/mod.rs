//! 存储抽象
//!
//! nonce 集合与审计日志都是只追加的。唯一的并发协调点是 nonce 的唯一性约束：
//! [`NonceStore::insert`] 必须是原子的条件插入，同一个 nonce 并发插入时只有一个成功。
//!
//! SQLite 实现位于 `macgate-common`，这里提供内存实现供测试与嵌入使用。

pub mod memory;

use crate::types::{AuditEntry, AuditRecord};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::{MemoryAuditStore, MemoryNonceStore};

/// 存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 唯一键已存在
    #[error("Duplicate key")]
    Duplicate,

    /// 后端故障
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// nonce 存储
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// 查询 nonce 是否已被使用
    async fn exists(&self, nonce: &str) -> Result<bool, StoreError>;

    /// 原子地插入 nonce
    ///
    /// 已存在时返回 [`StoreError::Duplicate`]，不论是之前用过还是刚刚输掉并发竞争
    async fn insert(&self, nonce: &str, used_at: i64) -> Result<(), StoreError>;

    /// 已记录的 nonce 数量
    async fn count(&self) -> Result<u64, StoreError>;

    /// 后端名称
    fn backend_name(&self) -> &'static str;
}

/// 审计日志存储
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// 追加一条记录，返回其 id
    async fn append(&self, entry: AuditEntry) -> Result<i64, StoreError>;

    /// 按创建时间倒序返回最多 `limit` 条记录（同一秒内按 id 倒序）
    async fn recent(&self, limit: u32) -> Result<Vec<AuditRecord>, StoreError>;
}
