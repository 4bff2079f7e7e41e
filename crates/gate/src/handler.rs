//! 请求校验编排
//!
//! 状态机：
//!
//! ```text
//! Start ─(无 MAC)──────────────────────────────────────────────► NoMac (400)
//!   └─► ParseEnvelope ─(有信封)─► TimestampCheck ─► NonceCheck ─┐
//!              └─(无信封)──────────────────────────────────────┴► MacCheck ─► Verified (200)
//!                                                                        └─► BadMac (401)
//! ```
//!
//! 防重放失败直接终止，不进入 MacCheck。每个终态在返回前恰好写入一条审计记录。

use crate::audit::AuditLog;
use crate::crypto::{Secret, compute_mac, constant_time_equals};
use crate::envelope::Envelope;
use crate::metrics::VERIFICATIONS_TOTAL;
use crate::replay::{Freshness, Rejection, ReplayGuard};
use crate::storage::{AuditStore, NonceStore};
use crate::types::ApiResponse;
use axum::http::StatusCode;
use std::sync::Arc;
use strum::AsRefStr;
use tracing::{debug, info};

/// 校验所需的全部依赖，在构造时显式传入
pub struct GateContext {
    pub secret: Secret,
    pub window_secs: u64,
    pub nonce_store: Arc<dyn NonceStore>,
    pub audit_store: Arc<dyn AuditStore>,
}

/// 终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    /// 缺少 X-HMAC 头
    MissingSignature,
    /// 防重放检查失败
    Rejected(Rejection),
    /// MAC 不匹配
    SignatureMismatch,
    /// MAC 匹配
    Verified,
}

impl Outcome {
    pub fn reason(&self) -> &'static str {
        match self {
            Outcome::MissingSignature => "no hmac",
            Outcome::Rejected(rejection) => rejection.reason(),
            Outcome::SignatureMismatch => "bad hmac",
            Outcome::Verified => "verified",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::MissingSignature => StatusCode::BAD_REQUEST,
            Outcome::Rejected(rejection) => rejection.status(),
            Outcome::SignatureMismatch => StatusCode::UNAUTHORIZED,
            Outcome::Verified => StatusCode::OK,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Verified)
    }
}

/// 单次校验的结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,
    /// 被消耗的 nonce（若有）
    pub consumed_nonce: Option<String>,
}

impl Verdict {
    pub fn status(&self) -> StatusCode {
        self.outcome.status()
    }

    pub fn reason(&self) -> &'static str {
        self.outcome.reason()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn to_response(&self) -> ApiResponse {
        if self.is_ok() {
            ApiResponse::accepted(self.reason())
        } else {
            ApiResponse::rejected(self.reason())
        }
    }
}

/// 请求校验器
#[derive(Debug)]
pub struct RequestHandler {
    secret: Secret,
    replay_guard: ReplayGuard,
    audit_log: AuditLog,
}

impl RequestHandler {
    pub fn new(context: GateContext) -> Self {
        Self {
            secret: context.secret,
            replay_guard: ReplayGuard::new(context.nonce_store, context.window_secs),
            audit_log: AuditLog::new(context.audit_store),
        }
    }

    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay_guard
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// 以当前系统时间校验一个请求
    pub async fn verify(&self, body: &[u8], presented_mac: Option<&str>) -> Verdict {
        self.verify_at(body, presented_mac, chrono::Utc::now().timestamp())
            .await
    }

    /// 以给定时间（Unix 秒）校验一个请求
    ///
    /// 空的 MAC 头视同缺失
    pub async fn verify_at(&self, body: &[u8], presented_mac: Option<&str>, now: i64) -> Verdict {
        let presented_mac = presented_mac.filter(|mac| !mac.is_empty());
        let (outcome, consumed_nonce) = self.decide(body, presented_mac, now).await;

        self.audit_log
            .record(body, presented_mac, outcome.is_ok(), outcome.reason(), now)
            .await;

        VERIFICATIONS_TOTAL
            .with_label_values(&[outcome.as_ref(), outcome.reason()])
            .inc();

        if outcome.is_ok() {
            debug!(nonce = ?consumed_nonce, "Request verified");
        } else {
            info!(
                reason = outcome.reason(),
                status = outcome.status().as_u16(),
                "Request rejected"
            );
        }

        Verdict {
            outcome,
            consumed_nonce,
        }
    }

    async fn decide(
        &self,
        body: &[u8],
        presented_mac: Option<&str>,
        now: i64,
    ) -> (Outcome, Option<String>) {
        let Some(presented_mac) = presented_mac else {
            return (Outcome::MissingSignature, None);
        };

        let envelope = Envelope::parse(body);
        let consumed_nonce = match self.replay_guard.check(&envelope, now).await {
            Ok(Freshness::Unprotected) => None,
            Ok(Freshness::Consumed { nonce }) => Some(nonce),
            Err(rejection) => return (Outcome::Rejected(rejection), None),
        };

        // nonce 已在此之前被消耗，MAC 错误也不会归还
        let expected = compute_mac(self.secret.as_bytes(), body);
        if constant_time_equals(&expected, presented_mac) {
            (Outcome::Verified, consumed_nonce)
        } else {
            (Outcome::SignatureMismatch, consumed_nonce)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayStage;
    use crate::storage::{MemoryAuditStore, MemoryNonceStore, StoreError};
    use crate::types::{AuditEntry, AuditRecord};
    use async_trait::async_trait;

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        handler: RequestHandler,
        nonces: Arc<MemoryNonceStore>,
        audit: Arc<MemoryAuditStore>,
    }

    fn fixture(secret: &str) -> Fixture {
        let nonces = Arc::new(MemoryNonceStore::new());
        let audit = Arc::new(MemoryAuditStore::new());
        let handler = RequestHandler::new(GateContext {
            secret: Secret::new(secret),
            window_secs: 60,
            nonce_store: nonces.clone(),
            audit_store: audit.clone(),
        });
        Fixture {
            handler,
            nonces,
            audit,
        }
    }

    fn signed_envelope(secret: &str, timestamp: i64, nonce: &str) -> (Vec<u8>, String) {
        let body = format!(r#"{{"timestamp": {timestamp}, "nonce": "{nonce}"}}"#).into_bytes();
        let mac = compute_mac(secret.as_bytes(), &body);
        (body, mac)
    }

    #[tokio::test]
    async fn test_missing_header() {
        let f = fixture("k");
        let verdict = f.handler.verify_at(b"anything", None, NOW).await;

        assert_eq!(verdict.status(), StatusCode::BAD_REQUEST);
        assert_eq!(verdict.reason(), "no hmac");

        let rows = f.audit.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].ok);
        assert_eq!(rows[0].client_hmac, None);
    }

    #[tokio::test]
    async fn test_empty_header_treated_as_missing() {
        let f = fixture("k");
        let verdict = f.handler.verify_at(b"anything", Some(""), NOW).await;
        assert_eq!(verdict.outcome, Outcome::MissingSignature);
    }

    #[tokio::test]
    async fn test_malformed_json_with_valid_mac_is_verified() {
        let f = fixture("k");
        let body = b"{not json";
        let mac = compute_mac(b"k", body);

        let verdict = f.handler.verify_at(body, Some(&mac), NOW).await;
        assert_eq!(verdict.status(), StatusCode::OK);
        assert_eq!(verdict.reason(), "verified");
        assert_eq!(verdict.consumed_nonce, None);
        assert_eq!(f.nonces.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_then_replay() {
        let f = fixture("k");
        let (body, mac) = signed_envelope("k", NOW, "n1");

        let first = f.handler.verify_at(&body, Some(&mac), NOW).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.consumed_nonce.as_deref(), Some("n1"));
        assert_eq!(first.to_response(), ApiResponse::accepted("verified"));
        assert!(f.nonces.exists("n1").await.unwrap());
        assert_eq!(f.nonces.count().await.unwrap(), 1);

        let rows = f.audit.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ok);

        let second = f.handler.verify_at(&body, Some(&mac), NOW).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(second.reason(), "replay nonce used");
        assert_eq!(
            second.outcome,
            Outcome::Rejected(Rejection::ReplayDetected {
                stage: ReplayStage::PreCheck
            })
        );
        assert_eq!(f.audit.len().await, 2);
    }

    #[tokio::test]
    async fn test_bad_mac_still_burns_nonce() {
        let f = fixture("k");
        let (body, _mac) = signed_envelope("k", NOW, "burned");
        let forged = compute_mac(b"wrong-secret", &body);

        let verdict = f.handler.verify_at(&body, Some(&forged), NOW).await;
        assert_eq!(verdict.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(verdict.reason(), "bad hmac");
        assert!(f.nonces.exists("burned").await.unwrap());

        // 合法发送方随后使用同一 nonce 会被当作重放
        let (body, mac) = signed_envelope("k", NOW, "burned");
        let verdict = f.handler.verify_at(&body, Some(&mac), NOW).await;
        assert_eq!(verdict.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_replay_rejection_skips_mac_check() {
        let f = fixture("k");
        let body = br#"{"timestamp": "later", "nonce": "n1"}"#;

        // MAC 明显非法，但先失败的是 timestamp
        let verdict = f.handler.verify_at(body, Some("zz"), NOW).await;
        assert_eq!(verdict.reason(), "bad timestamp");
        assert_eq!(verdict.status(), StatusCode::BAD_REQUEST);

        let (body, mac) = signed_envelope("k", NOW - 3600, "old");
        let verdict = f.handler.verify_at(&body, Some(&mac), NOW).await;
        assert_eq!(verdict.reason(), "timestamp out of window");
        assert!(!f.nonces.exists("old").await.unwrap());
    }

    #[tokio::test]
    async fn test_each_terminal_state_logs_once() {
        let f = fixture("k");
        let (body, mac) = signed_envelope("k", NOW, "a");

        f.handler.verify_at(b"x", None, NOW).await;
        f.handler.verify_at(&body, Some(&mac), NOW).await;
        f.handler.verify_at(&body, Some(&mac), NOW).await;
        f.handler.verify_at(b"plain", Some("00"), NOW).await;

        let rows = f.audit.recent(10).await.unwrap();
        let reasons: Vec<&str> = rows.iter().map(|r| r.reason.as_str()).collect();
        assert_eq!(
            reasons,
            vec!["bad hmac", "replay nonce used", "verified", "no hmac"]
        );
    }

    struct FailingAuditStore;

    #[async_trait]
    impl AuditStore for FailingAuditStore {
        async fn append(&self, _entry: AuditEntry) -> Result<i64, StoreError> {
            Err(StoreError::Backend("read-only database".to_string()))
        }

        async fn recent(&self, _limit: u32) -> Result<Vec<AuditRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_change_verdict() {
        let handler = RequestHandler::new(GateContext {
            secret: Secret::new("k"),
            window_secs: 60,
            nonce_store: Arc::new(MemoryNonceStore::new()),
            audit_store: Arc::new(FailingAuditStore),
        });
        let (body, mac) = signed_envelope("k", NOW, "n1");

        let verdict = handler.verify_at(&body, Some(&mac), NOW).await;
        assert!(verdict.is_ok());
        assert_eq!(verdict.status(), StatusCode::OK);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Verified.as_ref(), "verified");
        assert_eq!(Outcome::MissingSignature.as_ref(), "missing_signature");
        assert_eq!(
            Outcome::Rejected(Rejection::InvalidTimestamp).as_ref(),
            "rejected"
        );
    }
}
