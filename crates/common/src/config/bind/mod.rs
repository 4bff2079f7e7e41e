pub mod http;

pub use crate::config::bind::http::HttpBindConfig;
use serde::{Deserialize, Serialize};

/// 网络绑定配置
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BindConfig {
    /// HTTP 服务绑定配置
    ///
    /// 生产环境建议放在 TLS 反向代理之后。
    #[serde(default)]
    pub http: HttpBindConfig,
}
