//! Prometheus 监控指标模块
//!
//! 提供全局指标收集和导出功能。校验相关的指标定义在 `gate::metrics`，这里负责注册与导出。

use lazy_static::lazy_static;
use prometheus::{IntGaugeVec, Opts, Registry};
use std::sync::Once;
use tracing::warn;

static METRICS_INIT: Once = Once::new();

lazy_static! {
    /// 全局 Prometheus Registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// 构建信息，值恒为 1
    pub static ref BUILD_INFO: IntGaugeVec = IntGaugeVec::new(
        Opts::new("build_info", "Build information of the running binary")
            .namespace("macgate"),
        &["version"]
    ).unwrap();
}

/// 注册所有指标到全局 Registry
///
/// This function is idempotent - calling it multiple times is safe.
/// Only the first call will actually register the metrics.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let mut result = Ok(());

    METRICS_INIT.call_once(|| {
        let register_result = (|| {
            REGISTRY.register(Box::new(BUILD_INFO.clone()))?;
            gate::register_gate_metrics(&REGISTRY)?;

            BUILD_INFO
                .with_label_values(&[env!("CARGO_PKG_VERSION")])
                .set(1);

            Ok::<(), prometheus::Error>(())
        })();

        if let Err(e) = register_result {
            result = Err(e);
        }
    });

    result
}

/// 导出 Prometheus 格式的指标
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_export_metrics() {
        let _ = register_metrics();

        gate::metrics::VERIFICATIONS_TOTAL
            .with_label_values(&["verified", "verified"])
            .inc();

        let output = export_metrics();
        assert!(
            output.contains("macgate_verifications_total"),
            "Output should contain verifications metric. Output: {}",
            output
        );
        assert!(
            output.contains("macgate_build_info"),
            "Output should contain build info. Output: {}",
            output
        );
    }
}
