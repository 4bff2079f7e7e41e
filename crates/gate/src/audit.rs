//! 审计日志
//!
//! 每次校验恰好追加一条记录。写入是尽力而为：失败只记入运维日志，
//! 不会改变返回给调用方的校验结果。

use crate::error::GateResult;
use crate::metrics::AUDIT_WRITE_FAILURES;
use crate::storage::AuditStore;
use crate::types::{AuditEntry, AuditRecord};
use std::sync::Arc;
use tracing::{trace, warn};

/// `GET /logs` 返回的最大条数
pub const MAX_LOG_ROWS: u32 = 200;

/// 审计日志
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// 追加一条校验记录，不返回错误
    pub async fn record(
        &self,
        payload: &[u8],
        client_hmac: Option<&str>,
        ok: bool,
        reason: &str,
        created_at: i64,
    ) {
        let entry = AuditEntry {
            payload: String::from_utf8_lossy(payload).into_owned(),
            client_hmac: client_hmac.map(str::to_string),
            ok,
            reason: reason.to_string(),
            created_at,
        };

        match self.store.append(entry).await {
            Ok(id) => trace!(id, reason, "Audit record appended"),
            Err(e) => {
                AUDIT_WRITE_FAILURES.inc();
                warn!(error = %e, reason, ok, "Failed to append audit record");
            }
        }
    }

    /// 最近的审计记录，最新在前，最多 [`MAX_LOG_ROWS`] 条
    pub async fn recent(&self) -> GateResult<Vec<AuditRecord>> {
        Ok(self.store.recent(MAX_LOG_ROWS).await?)
    }
}
