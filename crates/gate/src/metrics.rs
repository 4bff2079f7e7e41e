//! Gate 监控指标
//!
//! 指标名带 `macgate_` 命名空间前缀，例如 `macgate_verifications_total`。

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

lazy_static! {
    /// 校验结果计数
    pub static ref VERIFICATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("verifications_total", "Total number of request verifications")
            .namespace("macgate"),
        &["outcome", "reason"]
    ).unwrap();

    /// HTTP 请求延迟（秒）
    pub static ref REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("request_duration_seconds", "HTTP request duration in seconds")
            .namespace("macgate")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "path", "status"]
    ).unwrap();

    /// 审计日志写入失败次数
    pub static ref AUDIT_WRITE_FAILURES: IntCounter = IntCounter::with_opts(
        Opts::new("audit_write_failures_total", "Total number of failed audit log writes")
            .namespace("macgate")
    ).unwrap();

    /// nonce 存储故障次数（按失败关闭处理）
    pub static ref NONCE_STORE_FAILURES: IntCounter = IntCounter::with_opts(
        Opts::new("nonce_store_failures_total", "Total number of nonce store failures")
            .namespace("macgate")
    ).unwrap();
}

/// 注册 Gate metrics 到给定 registry
pub fn register_gate_metrics(registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(VERIFICATIONS_TOTAL.clone()))?;
    registry.register(Box::new(REQUEST_DURATION.clone()))?;
    registry.register(Box::new(AUDIT_WRITE_FAILURES.clone()))?;
    registry.register(Box::new(NONCE_STORE_FAILURES.clone()))?;
    Ok(())
}
