//! 错误处理模块
//!
//! 按概念分离的错误类型定义，遵循一个文件一个核心概念的原则

// 子模块声明
mod config_error;
mod database_error;

// 导出公共 API
pub use config_error::ConfigError;
pub use database_error::DatabaseError;
