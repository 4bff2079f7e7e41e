use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// HTTP 服务绑定配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpBindConfig {
    /// 绑定 IP 地址
    ///
    /// 服务实际绑定的网络接口 IP 地址。
    /// 使用 "0.0.0.0" 监听所有接口。
    pub ip: String,

    /// 绑定端口
    pub port: u16,
}

impl Default for HttpBindConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl HttpBindConfig {
    /// 解析为监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|e| format!("Invalid bind ip '{}': {e}", self.ip))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
