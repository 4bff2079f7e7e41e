//! 统一配置管理系统
//!
//! 本模块是 macgate 配置的"单一真理之源"。
//! 所有配置项的定义、文档、默认值都在这里统一管理。

pub mod bind;

pub use crate::config::bind::{BindConfig, HttpBindConfig};
use crate::error::ConfigError;
use gate::GateServiceConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// 共享密钥的建议最小长度（字节）
pub const MIN_SECRET_LEN: usize = 16;

/// macgate 的主配置结构体
///
/// 配置文件使用 TOML 格式，支持完整的类型安全加载。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MacgateConfig {
    /// 服务器实例名称
    ///
    /// 用于在日志中区分不同实例，如：macgate-01, macgate-prod-east-1 等。
    pub name: String,

    /// 运行环境标识
    ///
    /// - "dev": 开发环境
    /// - "prod": 生产环境，更严格的检查
    /// - "test": 测试环境，用于自动化测试
    pub env: String,

    /// 网络绑定配置
    #[serde(default)]
    pub bind: BindConfig,

    /// Gate 服务配置：时间窗口、请求体上限、共享密钥来源
    #[serde(default)]
    pub gate: GateServiceConfig,

    /// SQLite 数据库文件存储目录路径
    ///
    /// 数据库文件将存储为 `{sqlite_path}/macgate.db`，包括审计日志和已使用的 nonce。
    #[serde(
        serialize_with = "serialize_pathbuf",
        deserialize_with = "deserialize_pathbuf"
    )]
    pub sqlite_path: PathBuf,

    /// 可观测性配置
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 过滤级别
    ///
    /// 支持 EnvFilter 语法（如 "info,hyper=warn"）。默认值 "info"。
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 日志输出目标
    ///
    /// - "console": 仅输出到控制台（默认）
    /// - "file": 输出到文件
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志轮转开关
    ///
    /// 当 output = "file" 时有效：
    /// - true: 按天轮转日志文件
    /// - false: 追加到单个文件
    #[serde(default)]
    pub rotate: bool,

    /// 日志文件路径
    ///
    /// 当 output = "file" 时有效
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            filter_level: default_filter_level(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

fn serialize_pathbuf<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    path.display().to_string().serialize(serializer)
}

fn deserialize_pathbuf<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(PathBuf::from(s))
}

impl Default for MacgateConfig {
    fn default() -> Self {
        Self {
            name: "macgate-default".to_string(),
            env: "dev".to_string(),
            bind: BindConfig::default(),
            gate: GateServiceConfig {
                secret_env: Some("MACGATE_SECRET".to_string()),
                ..Default::default()
            },
            sqlite_path: PathBuf::from("database"),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl MacgateConfig {
    /// 返回日志配置引用
    pub fn log_config(&self) -> &LogConfig {
        &self.observability.log
    }

    /// 检查是否使用控制台日志输出
    pub fn is_console_logging(&self) -> bool {
        self.observability.log.output == "console"
    }

    /// 检查是否应该轮转日志
    pub fn should_rotate_logs(&self) -> bool {
        self.observability.log.output == "file" && self.observability.log.rotate
    }

    /// 获取日志过滤级别，优先使用 RUST_LOG
    pub fn get_filter_level(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|v| {
                let trimmed = v.trim().to_string();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            })
            .unwrap_or_else(|| self.observability.filter_level.clone())
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // Check if path is a file, not a directory
        if !path_ref.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path_ref).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;

        Self::from_toml(&content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// 验证配置有效性
    ///
    /// 以 `Warning:` 开头的条目不影响启动，其余条目是致命错误。
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // 验证实例名称
        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        // 验证环境
        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "Invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }

        // 验证过滤级别（EnvFilter 语法）
        {
            let main_level = self
                .observability
                .filter_level
                .split(',')
                .next()
                .unwrap_or("")
                .trim();
            if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
                errors.push(format!(
                    "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                    self.observability.filter_level
                ));
            }
        }

        // 验证日志输出
        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        // 验证绑定地址
        if self.bind.http.port == 0 {
            errors.push("HTTP bind port cannot be 0 (bind.http.port)".to_string());
        }
        if let Err(e) = self.bind.http.socket_addr() {
            errors.push(e);
        }

        // 验证 Gate 参数
        if self.gate.window_secs == 0 {
            errors.push("Timestamp window must be greater than 0 (gate.window_secs)".to_string());
        }
        if self.gate.max_body_bytes == 0 {
            errors.push("Body limit must be greater than 0 (gate.max_body_bytes)".to_string());
        }

        // 验证共享密钥
        if self.gate.get_secret_source().is_none() {
            errors.push(
                "No shared secret configured: set gate.secret_file, gate.secret_env or gate.secret"
                    .to_string(),
            );
        } else {
            if self.gate.secret.is_some()
                && self.gate.secret_file.is_none()
                && self.gate.secret_env.is_none()
            {
                errors.push("Warning: gate.secret is stored inline; prefer gate.secret_env or gate.secret_file".to_string());
            }

            match self.gate.resolve_secret() {
                Ok(secret) if secret.len() < MIN_SECRET_LEN => {
                    errors.push(format!(
                        "Warning: shared secret is too short ({} bytes), recommend at least {MIN_SECRET_LEN}",
                        secret.len()
                    ));
                }
                Ok(_) => {}
                Err(e) => errors.push(format!("Shared secret cannot be loaded: {e}")),
            }
        }

        // 验证 SQLite 路径
        if self
            .sqlite_path
            .to_str()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
        {
            errors.push("SQLite database path cannot be empty".to_string());
        }

        // 生产环境额外检查
        if self.env == "prod" {
            // 生产环境应使用文件日志
            if self.observability.log.output == "console" {
                errors.push("Warning: Production environment should use file logging (observability.log.output = \"file\")".to_string());
            }

            // 生产环境建议启用日志轮转
            if self.observability.log.output == "file" && !self.observability.log.rotate {
                errors.push("Warning: Production environment should enable log rotation (observability.log.rotate = true)".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// 区分验证结果中的致命错误与警告
pub fn split_validation_errors(errors: Vec<String>) -> (Vec<String>, Vec<String>) {
    errors
        .into_iter()
        .partition(|error| !error.starts_with("Warning:"))
}
