//! Gate 服务错误定义
//!
//! 校验路径上的拒绝（签名错误、重放等）不走这里，它们是 [`crate::handler::Verdict`]；
//! 这里只描述服务自身的故障：配置、存储、客户端等。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::storage::StoreError;

/// Gate 服务错误类型
#[derive(Error, Debug)]
pub enum GateError {
    /// 存储后端错误
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 共享密钥加载失败
    #[error("Secret error: {0}")]
    Secret(String),

    /// 内部服务器错误
    #[error("Internal server error: {0}")]
    Internal(String),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP 客户端错误
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        // 不向客户端暴露内部错误详情
        tracing::error!("Gate request failed: {:?}", self);
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let error_message = "Internal server error";

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Gate 结果类型别名
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_hides_details() {
        let err = GateError::Storage(StoreError::Backend("disk I/O error at /var/db".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_config_error_maps_to_internal() {
        let response = GateError::Config("no secret".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
