//! 服务信息管理模块

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

use super::ServiceType;

/// 服务运行状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Unknown,
    Running(String),
    Error(String),
}

/// 服务基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// 服务名称
    pub name: String,
    pub service_type: ServiceType,
    /// 服务状态
    pub status: ServiceStatus,
    /// 服务描述
    pub description: Option<String>,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        service_type: ServiceType,
        description: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service_type,
            status: ServiceStatus::Unknown,
            description,
        }
    }

    /// 设置服务状态为运行中
    pub fn set_running(&mut self, url: Url) {
        self.status = ServiceStatus::Running(url.to_string());
        info!("Service '{}' is now running at {}", self.name, self.url());
    }

    /// 设置服务状态为错误
    pub fn set_error(&mut self, error: impl Into<String>) {
        let error_msg = error.into();
        error!("Service '{}' encountered error: {}", self.name, error_msg);
        self.status = ServiceStatus::Error(error_msg);
    }

    /// 检查服务是否正在运行
    pub fn is_running(&self) -> bool {
        matches!(self.status, ServiceStatus::Running(_))
    }

    /// 获取服务状态的 URL（如果是运行状态）
    pub fn url(&self) -> String {
        match &self.status {
            ServiceStatus::Running(url) => url.to_string(),
            _ => "N/A".to_string(),
        }
    }
}
