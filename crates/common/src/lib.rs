//! macgate 基础设施库
//!
//! 为 Gate 服务提供基础设施组件：配置加载与校验、SQLite 存储、错误类型、监控指标

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::MacgateConfig;
pub use error::{ConfigError, DatabaseError};
pub use storage::{Database, SqliteAuditStorage, SqliteNonceStorage};
