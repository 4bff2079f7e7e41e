//! Gate HTTP 服务实现
//!
//! 提供 `/api`、`/logs`、`/health` 三个端点

use crate::service::{HttpRouterService, ServiceType, info::ServiceInfo};
use ::gate::{create_gate_state, create_router};
use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use macgate_common::config::MacgateConfig;
use macgate_common::storage::{Database, SqliteAuditStorage, SqliteNonceStorage};
use std::sync::Arc;
use tracing::info;

/// Gate HTTP 服务实现
#[derive(Debug)]
pub struct GateHttpService {
    info: ServiceInfo,
    config: MacgateConfig,
}

impl GateHttpService {
    pub fn new(config: MacgateConfig) -> Self {
        Self {
            info: ServiceInfo::new(
                "Gate Service",
                ServiceType::Gate,
                Some("HMAC 请求签名校验与防重放服务".to_string()),
            ),
            config,
        }
    }
}

#[async_trait]
impl HttpRouterService for GateHttpService {
    fn info(&self) -> &ServiceInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ServiceInfo {
        &mut self.info
    }

    async fn build_router(&mut self) -> Result<Router> {
        info!("Building Gate router");

        // nonce 与审计日志共用 {sqlite_path}/macgate.db
        let database = Database::new(&self.config.sqlite_path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open database: {e}"))?;
        let nonce_store = Arc::new(SqliteNonceStorage::new(&database));
        let audit_store = Arc::new(SqliteAuditStorage::new(&database));

        let gate_state = create_gate_state(&self.config.gate, nonce_store, audit_store)
            .map_err(|e| anyhow::anyhow!("Failed to create Gate state: {e}"))?;

        let router = create_router(gate_state);

        info!("Gate router built successfully");
        Ok(router)
    }

    fn route_prefix(&self) -> Option<&str> {
        None
    }
}
