//! Gate HTTP 处理器

use crate::{
    config::GateServiceConfig,
    error::GateError,
    handler::{GateContext, RequestHandler},
    metrics::REQUEST_DURATION,
    storage::{AuditStore, NonceStore},
    types::{ApiResponse, AuditRecord},
};
use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Json, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// 客户端携带 MAC 的请求头（大小写不敏感）
pub const HMAC_HEADER: &str = "x-hmac";

/// Gate 服务状态
#[derive(Clone)]
pub struct GateState {
    pub handler: Arc<RequestHandler>,
    pub max_body_bytes: usize,
}

impl GateState {
    pub fn new(handler: RequestHandler, max_body_bytes: usize) -> Self {
        Self {
            handler: Arc::new(handler),
            max_body_bytes,
        }
    }
}

/// 从 Gate 配置创建 GateState
///
/// 存储实例由调用方提供，SQLite 实现在 `macgate-common` 中，避免循环依赖
pub fn create_gate_state(
    service_config: &GateServiceConfig,
    nonce_store: Arc<dyn NonceStore>,
    audit_store: Arc<dyn AuditStore>,
) -> Result<GateState, GateError> {
    info!("Initializing Gate state from GateServiceConfig");

    let secret = service_config.resolve_secret()?;
    info!(
        window_secs = service_config.window_secs,
        backend = nonce_store.backend_name(),
        "Shared secret loaded ({} bytes)",
        secret.len()
    );

    let handler = RequestHandler::new(GateContext {
        secret,
        window_secs: service_config.window_secs,
        nonce_store,
        audit_store,
    });

    Ok(GateState::new(handler, service_config.max_body_bytes))
}

/// 创建 Gate 服务的路由
pub fn create_router(state: GateState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/api", post(api_handler))
        .route("/logs", get(logs_handler))
        .route("/health", get(health_check_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn api_handler(
    State(app_state): State<GateState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse>) {
    let start_time = Instant::now();

    let presented_mac = headers
        .get(HMAC_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let verdict = app_state
        .handler
        .verify(&body, presented_mac.as_deref())
        .await;
    let status = verdict.status();

    REQUEST_DURATION
        .with_label_values(&["POST", "/api", status.as_str()])
        .observe(start_time.elapsed().as_secs_f64());

    (status, Json(verdict.to_response()))
}

async fn logs_handler(
    State(app_state): State<GateState>,
) -> Result<Json<Vec<AuditRecord>>, GateError> {
    let start_time = Instant::now();
    let result = app_state.handler.audit_log().recent().await;
    observe_duration("GET", "/logs", result.is_ok(), start_time);

    let records = result?;
    debug!("Returning {} audit records", records.len());
    Ok(Json(records))
}

async fn health_check_handler(
    State(app_state): State<GateState>,
) -> Result<Json<serde_json::Value>, GateError> {
    debug!("Health check requested");
    let start_time = Instant::now();

    let replay_guard = app_state.handler.replay_guard();
    let result = replay_guard.nonce_store().count().await;
    observe_duration("GET", "/health", result.is_ok(), start_time);
    let nonce_count = result?;

    let response = serde_json::json!({
        "status": "healthy",
        "service": "gate",
        "backend": replay_guard.nonce_store().backend_name(),
        "window_secs": replay_guard.window_secs(),
        "nonce_count": nonce_count,
        "timestamp": chrono::Utc::now().timestamp(),
    });

    Ok(Json(response))
}

/// 存储失败由 [`GateError`] 映射为 500
fn observe_duration(method: &str, path: &str, ok: bool, start_time: Instant) {
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    REQUEST_DURATION
        .with_label_values(&[method, path, status.as_str()])
        .observe(start_time.elapsed().as_secs_f64());
}
