//! Gate 服务配置
//!
//! 共享密钥不在代码中硬编码，必须通过配置文件、环境变量或密钥文件注入。

use crate::crypto::{Secret, SecretSource};
use crate::error::{GateError, GateResult};
use crate::replay::DEFAULT_WINDOW_SECS;
use serde::{Deserialize, Serialize};

/// 默认请求体上限（100 KiB）
pub const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024;

/// Gate 服务配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GateServiceConfig {
    /// 时间窗口（秒）
    ///
    /// 请求 timestamp 与服务器时间的最大允许偏差，边界包含。
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// 请求体上限（字节）
    ///
    /// 超过上限的请求在进入校验流程前被拒绝（413）。
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// 共享密钥 - 直接配置
    ///
    /// 注意：直接在配置文件中存储密钥不够安全，生产环境建议使用 secret_env 或 secret_file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// 共享密钥环境变量名称
    ///
    /// 例如：secret_env = "MACGATE_SECRET"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,

    /// 共享密钥文件路径
    ///
    /// 文件权限应设置为 600 (仅所有者可读写)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_file: Option<String>,
}

impl Default for GateServiceConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_body_bytes: default_max_body_bytes(),
            secret: None,
            secret_env: None,
            secret_file: None,
        }
    }
}

fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECS
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl GateServiceConfig {
    /// 获取密钥来源
    ///
    /// 优先级: secret_file > secret_env > secret
    pub fn get_secret_source(&self) -> Option<SecretSource> {
        if let Some(path) = &self.secret_file {
            return Some(SecretSource::File(path.clone()));
        }

        if let Some(env_var) = &self.secret_env {
            return Some(SecretSource::Environment(env_var.clone()));
        }

        if let Some(secret) = &self.secret {
            return Some(SecretSource::Direct(secret.clone()));
        }

        None
    }

    /// 解析并加载共享密钥
    pub fn resolve_secret(&self) -> GateResult<Secret> {
        let source = self.get_secret_source().ok_or_else(|| {
            GateError::Config(
                "No shared secret configured: set gate.secret_file, gate.secret_env or gate.secret"
                    .to_string(),
            )
        })?;
        Secret::from_source(&source)
    }
}
