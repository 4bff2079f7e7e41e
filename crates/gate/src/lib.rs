//! Gate - HMAC 请求签名校验与防重放服务
//!
//! Gate 服务提供以下功能：
//! 1. HMAC-SHA256 请求体签名校验（常数时间比较）
//! 2. 基于 timestamp 窗口与一次性 nonce 的防重放保护
//! 3. 每次校验一条的只追加审计日志
//! 4. 可插拔的存储后端：内存实现在此，SQLite 实现在 `macgate-common`

pub mod audit;
pub mod client;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod metrics;
pub mod replay;
pub mod storage;
pub mod types;

// Re-export commonly used items
pub use audit::{AuditLog, MAX_LOG_ROWS};
pub use client::{Client, ClientConfig};
pub use config::GateServiceConfig;
pub use crypto::{Secret, SecretSource, compute_mac, constant_time_equals};
pub use envelope::Envelope;
pub use error::{GateError, GateResult};
pub use handler::{GateContext, Outcome, RequestHandler, Verdict};
pub use handlers::{GateState, HMAC_HEADER, create_gate_state, create_router};
pub use metrics::register_gate_metrics;
pub use replay::{Freshness, Rejection, ReplayGuard, ReplayStage};
pub use storage::{AuditStore, MemoryAuditStore, MemoryNonceStore, NonceStore, StoreError};
pub use types::{ApiResponse, AuditEntry, AuditRecord, NonceRecord};
