//! # macgate
//!
//! HMAC 请求签名校验网关：防重放保护与审计日志

pub mod service;

// Re-export commonly used types
pub use macgate_common::config::MacgateConfig;
pub use service::{GateHttpService, ServiceManager};
