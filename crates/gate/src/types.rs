//! Gate 数据类型定义

use serde::{Deserialize, Serialize};

/// 已使用的 nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRecord {
    pub nonce: String,
    /// Unix 时间戳（秒）
    pub used_at: i64,
}

/// 审计日志条目（已持久化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    /// 原始请求体（UTF-8，非法字节被替换）
    pub payload: String,
    /// 客户端提交的 MAC，缺失时为 None
    pub client_hmac: Option<String>,
    pub ok: bool,
    pub reason: String,
    /// Unix 时间戳（秒）
    pub created_at: i64,
}

/// 待写入的审计日志条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub payload: String,
    pub client_hmac: Option<String>,
    pub ok: bool,
    pub reason: String,
    pub created_at: i64,
}

impl AuditEntry {
    pub fn into_record(self, id: i64) -> AuditRecord {
        AuditRecord {
            id,
            payload: self.payload,
            client_hmac: self.client_hmac,
            ok: self.ok,
            reason: self.reason,
            created_at: self.created_at,
        }
    }
}

/// `POST /api` 响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ApiResponse {
    pub fn accepted(msg: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: None,
            msg: Some(msg.into()),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            msg: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_shape() {
        let accepted = serde_json::to_value(ApiResponse::accepted("verified")).unwrap();
        assert_eq!(accepted, serde_json::json!({"ok": true, "msg": "verified"}));

        let rejected = serde_json::to_value(ApiResponse::rejected("bad hmac")).unwrap();
        assert_eq!(rejected, serde_json::json!({"ok": false, "reason": "bad hmac"}));
    }
}
