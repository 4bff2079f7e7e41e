//! 服务管理器模块 - 负责 HTTP 服务的生命周期

use super::HttpRouterService;
use crate::service::trace::http_trace_layer;
use anyhow::Result;
use axum::Router;
use macgate_common::config::MacgateConfig;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use url::Url;

/// 服务管理器，负责管理多个服务的生命周期
#[derive(Debug)]
pub struct ServiceManager {
    services: Vec<Box<dyn HttpRouterService>>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    config: MacgateConfig,
    local_addr: Option<SocketAddr>,
}

impl ServiceManager {
    /// 创建新的服务管理器
    pub fn new(config: MacgateConfig, shutdown_tx: tokio::sync::broadcast::Sender<()>) -> Self {
        Self {
            services: Vec::new(),
            shutdown_tx,
            config,
            local_addr: None,
        }
    }

    /// 添加服务到管理器
    pub fn add_service(&mut self, service: Box<dyn HttpRouterService>) {
        info!("Adding service '{}' to manager", service.info().name);
        self.services.push(service);
    }

    /// 实际监听的地址（启动后可用）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 启动所有服务
    ///
    /// 所有 HTTP 路由服务合并到同一个服务器上
    pub async fn start_all(&mut self) -> Result<Vec<JoinHandle<()>>> {
        info!(
            "Starting {} services ({})",
            self.services.len(),
            self.services
                .iter()
                .map(|s| s.info().service_type.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let handle = self.start_http_services().await?;
        Ok(vec![handle])
    }

    /// 启动HTTP服务器，合并所有HTTP路由服务
    async fn start_http_services(&mut self) -> Result<JoinHandle<()>> {
        let bind_addr = self
            .config
            .bind
            .http
            .socket_addr()
            .map_err(|e| anyhow::anyhow!(e))?;

        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to address '{bind_addr}': {e}"))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        let public_url = Url::parse(&format!("http://{local_addr}"))
            .map_err(|e| anyhow::anyhow!("Failed to parse HTTP URL: {e}"))?;

        info!(
            "Starting HTTP server with {} route services (environment: {})",
            self.services.len(),
            self.config.env
        );

        // 构建合并的路由器
        let mut app = Router::new();

        for service in &mut self.services {
            let service_name = service.info().name.clone();

            let router = match service.build_router().await {
                Ok(router) => router,
                Err(e) => {
                    service.info_mut().set_error(e.to_string());
                    return Err(e.context(format!(
                        "Failed to build router for service '{service_name}'"
                    )));
                }
            };

            // axum 不允许在 "/" 上 nest，无前缀的服务直接 merge
            app = match service.route_prefix() {
                Some(prefix) => {
                    info!("Adding route '{}' for service '{}'", prefix, service_name);
                    app.nest(prefix, router)
                }
                None => {
                    info!("Merging routes of service '{}' at root", service_name);
                    app.merge(router)
                }
            };

            if let Err(e) = service.on_start(public_url.clone()).await {
                error!("Failed to start service '{}': {:?}", service_name, e);
            }
        }

        // 添加全局 Prometheus metrics 端点
        info!("Adding /metrics endpoint for Prometheus");
        app = app.route("/metrics", axum::routing::get(metrics_handler));

        // 添加全局中间件层
        app = app
            .layer(http_trace_layer())
            .layer(CorsLayer::permissive());

        info!("HTTP server listening on {}", local_addr);

        let shutdown_tx = self.shutdown_tx.clone();
        let handle = tokio::spawn(async move {
            let mut shutdown_rx = shutdown_tx.subscribe();
            let server = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server received shutdown signal");
            });
            if let Err(e) = server.await {
                error!("HTTP server error: {}", e);
                let _ = shutdown_tx.send(());
            }
            info!("HTTP server stopped");
        });

        Ok(handle)
    }

    /// Stop all services
    pub async fn stop_all(&mut self) -> Result<()> {
        info!("Stopping all services");

        let _ = self.shutdown_tx.send(());
        for service in &mut self.services {
            service.on_stop().await?;
        }

        info!("All services stopped");
        Ok(())
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> String {
    macgate_common::metrics::export_metrics()
}
