//! 防重放检查
//!
//! 对带信封的请求依次执行时间窗口检查和 nonce 唯一性检查。
//! 两项检查通过后 nonce 立即被消耗，此时 MAC 尚未校验。

use crate::envelope::{Envelope, timestamp_secs};
use crate::metrics::NONCE_STORE_FAILURES;
use crate::storage::{NonceStore, StoreError};
use axum::http::StatusCode;
use std::sync::Arc;
use strum::IntoStaticStr;
use tracing::{debug, warn};

/// 默认时间窗口（秒）
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// 重放在哪个阶段被发现，仅用于诊断
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ReplayStage {
    /// 插入前的存在性查询
    PreCheck,
    /// 条件插入失败（并发竞争、重复或存储故障）
    Insert,
}

/// 防重放拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// timestamp 无法转换为整数
    InvalidTimestamp,
    /// 与当前时间的偏差超过窗口
    TimestampWindowExceeded { skew_secs: u64 },
    /// nonce 已被使用
    ReplayDetected { stage: ReplayStage },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

impl std::error::Error for Rejection {}

impl Rejection {
    /// 返回给客户端的原因字符串
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::InvalidTimestamp => "bad timestamp",
            Rejection::TimestampWindowExceeded { .. } => "timestamp out of window",
            Rejection::ReplayDetected {
                stage: ReplayStage::PreCheck,
            } => "replay nonce used",
            Rejection::ReplayDetected {
                stage: ReplayStage::Insert,
            } => "replay nonce used (db)",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::InvalidTimestamp | Rejection::TimestampWindowExceeded { .. } => {
                StatusCode::BAD_REQUEST
            }
            Rejection::ReplayDetected { .. } => StatusCode::CONFLICT,
        }
    }
}

/// 检查通过后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// 无信封，未做防重放检查
    Unprotected,
    /// nonce 已被消耗
    Consumed { nonce: String },
}

/// 防重放守卫
#[derive(Clone)]
pub struct ReplayGuard {
    nonce_store: Arc<dyn NonceStore>,
    window_secs: u64,
}

impl std::fmt::Debug for ReplayGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayGuard")
            .field("backend", &self.nonce_store.backend_name())
            .field("window_secs", &self.window_secs)
            .finish()
    }
}

impl ReplayGuard {
    pub fn new(nonce_store: Arc<dyn NonceStore>, window_secs: u64) -> Self {
        Self {
            nonce_store,
            window_secs,
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn nonce_store(&self) -> &Arc<dyn NonceStore> {
        &self.nonce_store
    }

    /// 对信封执行时间窗口与 nonce 检查，`now` 为当前 Unix 秒
    pub async fn check(&self, envelope: &Envelope, now: i64) -> Result<Freshness, Rejection> {
        let Envelope::Present {
            timestamp, nonce, ..
        } = envelope
        else {
            debug!("No envelope present, replay protection skipped");
            return Ok(Freshness::Unprotected);
        };

        let ts = timestamp_secs(timestamp).ok_or(Rejection::InvalidTimestamp)?;

        // 边界包含：偏差恰好等于窗口时通过
        let skew_secs = now.abs_diff(ts);
        if skew_secs > self.window_secs {
            return Err(Rejection::TimestampWindowExceeded { skew_secs });
        }

        match self.nonce_store.exists(nonce).await {
            Ok(true) => {
                return Err(Rejection::ReplayDetected {
                    stage: ReplayStage::PreCheck,
                });
            }
            Ok(false) => {}
            Err(e) => {
                // 失败关闭：无法确认 nonce 未被使用时按重放处理
                warn!(error = %e, "Nonce lookup failed, rejecting request");
                NONCE_STORE_FAILURES.inc();
                return Err(Rejection::ReplayDetected {
                    stage: ReplayStage::Insert,
                });
            }
        }

        match self.nonce_store.insert(nonce, now).await {
            Ok(()) => Ok(Freshness::Consumed {
                nonce: nonce.clone(),
            }),
            Err(StoreError::Duplicate) => {
                debug!(nonce = %nonce, "Nonce insert lost a race");
                Err(Rejection::ReplayDetected {
                    stage: ReplayStage::Insert,
                })
            }
            Err(e) => {
                warn!(error = %e, "Nonce insert failed, rejecting request");
                NONCE_STORE_FAILURES.inc();
                Err(Rejection::ReplayDetected {
                    stage: ReplayStage::Insert,
                })
            }
        }
    }
}
