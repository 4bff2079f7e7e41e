//! Gate 客户端 - 签名并发送请求的简单 HTTP 客户端

use crate::crypto::{Secret, compute_mac};
use crate::error::{GateError, GateResult};
use crate::handlers::HMAC_HEADER;
use crate::types::{ApiResponse, AuditRecord};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Gate 服务客户端
#[derive(Debug, Clone)]
pub struct Client {
    endpoint: String,
    secret: Secret,
    http: reqwest::Client,
}

/// Gate 客户端配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Gate 服务地址，例如 "http://127.0.0.1:5000"
    pub endpoint: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

/// 标准请求信封
#[derive(Debug, Clone, Serialize)]
struct SignedEnvelope<'a> {
    action: &'a str,
    amount: i64,
    timestamp: i64,
    nonce: String,
}

impl Client {
    pub fn new(config: &ClientConfig, secret: Secret) -> GateResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            secret,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 计算请求体的 MAC（小写十六进制）
    pub fn sign(&self, body: &[u8]) -> String {
        compute_mac(self.secret.as_bytes(), body)
    }

    /// 签名并发送原始请求体
    pub async fn send_raw(&self, body: impl Into<Vec<u8>>) -> GateResult<(StatusCode, ApiResponse)> {
        let body = body.into();
        let mac = self.sign(&body);
        self.send_with_mac(body, Some(&mac)).await
    }

    /// 以指定的 MAC 头发送请求体，`None` 表示不带头
    pub async fn send_with_mac(
        &self,
        body: impl Into<Vec<u8>>,
        mac: Option<&str>,
    ) -> GateResult<(StatusCode, ApiResponse)> {
        let url = format!("{}/api", self.endpoint);
        let mut request = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.into());
        if let Some(mac) = mac {
            request = request.header(HMAC_HEADER, mac);
        }

        debug!("Sending request to {}", url);
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;
        let body: ApiResponse = serde_json::from_str(&text)?;
        Ok((status, body))
    }

    /// 构造带新鲜 timestamp 与随机 nonce 的信封并发送
    ///
    /// 返回发送的请求体，便于调用方重放或核对审计记录
    pub async fn send_envelope(
        &self,
        action: &str,
        amount: i64,
    ) -> GateResult<(StatusCode, ApiResponse, String)> {
        let body = envelope_body(action, amount, chrono::Utc::now().timestamp())?;
        let (status, response) = self.send_raw(body.clone()).await?;
        Ok((status, response, body))
    }

    /// 获取最近的审计记录
    pub async fn fetch_logs(&self) -> GateResult<Vec<AuditRecord>> {
        let url = format!("{}/logs", self.endpoint);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GateError::Internal(format!(
                "Log request failed with status {status}: {error_text}"
            )));
        }

        Ok(response.json().await?)
    }
}

/// 序列化信封，nonce 为随机 UUID v4
fn envelope_body(action: &str, amount: i64, timestamp: i64) -> GateResult<String> {
    let envelope = SignedEnvelope {
        action,
        amount,
        timestamp,
        nonce: uuid::Uuid::new_v4().to_string(),
    };
    Ok(serde_json::to_string(&envelope)?)
}
