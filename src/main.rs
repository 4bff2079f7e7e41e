//! macgate 主程序
//!
//! 启动 HMAC 请求校验服务，或校验配置文件、发送演示请求

mod cli;
mod error;
mod observability;

use anyhow::Context;
use clap::Parser;
use gate::{Client, ClientConfig};
use macgate::service::{GateHttpService, ServiceManager};
use macgate_common::config::{MacgateConfig, split_validation_errors};
use observability::init_observability;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands};
use error::{Error, Result};

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Test { config_file }) => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            ApplicationLauncher::test_config_file(&config_path)
        }
        Some(Commands::Demo { url }) => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(ApplicationLauncher::run_demo(&config_path, url.as_deref()))
        }
        None => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;

            // Create Tokio runtime（before running the application）
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            // Run the asynchronous application
            runtime.block_on(ApplicationLauncher::run_application(&config_path))
        }
    }
}

impl ApplicationLauncher {
    /// Find config file with fallback locations
    fn find_config_file(provided_path: &PathBuf) -> Result<PathBuf> {
        // If the provided path is not the default "config.toml", check if it exists
        if provided_path != Path::new("config.toml") {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(provided_path.clone());
            } else {
                bootstrap_error!("Provided config file not found: {:?}", provided_path);
                return Err(Error::custom(format!(
                    "Config file not found: {provided_path:?}"
                )));
            }
        }

        // Otherwise, try fallback locations
        let fallback_paths = vec![
            // 1. Current working directory
            PathBuf::from("config.toml"),
            // 2. System config directory
            PathBuf::from("/etc/macgate/config.toml"),
        ];

        bootstrap_info!("Searching for config file in default locations...");

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(path.clone());
            } else {
                bootstrap_info!("Config not found at: {:?}", path);
            }
        }

        // If no config file found, provide helpful error message
        bootstrap_error!("No configuration file found!");
        bootstrap_error!("Please create a config file in one of these locations:");
        for (i, path) in fallback_paths.iter().enumerate() {
            bootstrap_error!("  {}. {:?}", i + 1, path);
        }
        bootstrap_error!("Or specify a custom path with: macgate --config <path>");

        Err(Error::custom(
            "No configuration file found. Please create one or specify path with --config",
        ))
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &Path) -> Result<()> {
        // Initialize basic logging for test command
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();

        match MacgateConfig::from_file(config_path) {
            Ok(config) => {
                info!("✅ 配置文件解析成功: {:?}", config_path);

                // 验证配置
                match config.validate() {
                    Ok(()) => {
                        info!("✅ 配置验证通过");
                    }
                    Err(errors) => {
                        let (fatal, warnings) = split_validation_errors(errors);
                        for warning in &warnings {
                            info!("  ⚠️  {}", warning);
                        }
                        // 只有警告时仍视为通过
                        if !fatal.is_empty() {
                            error!("❌ 配置验证发现问题:");
                            for (i, err) in fatal.iter().enumerate() {
                                error!("  {}. ❌ {}", i + 1, err);
                            }
                            return Err(Error::service_validation("配置验证失败".to_string()));
                        }
                    }
                }

                info!("✅ 完整配置验证通过");
                Ok(())
            }
            Err(e) => {
                error!("❌ 配置文件解析失败: {}", e);
                Err(Error::service_validation(format!("配置解析失败: {e}")))
            }
        }
    }

    /// 加载并验证配置，警告只打印不中断
    fn load_config(config_path: &Path) -> Result<MacgateConfig> {
        let config = match MacgateConfig::from_file(config_path) {
            Ok(config) => {
                bootstrap_info!("✅ 配置加载成功");
                config
            }
            Err(e) => {
                bootstrap_error!("❌ 配置加载失败: {}", e);
                return Err(e.into());
            }
        };

        if let Err(errors) = config.validate() {
            let (fatal, warnings) = split_validation_errors(errors);
            for warning in &warnings {
                bootstrap_info!("  ⚠️  {}", warning);
            }
            if !fatal.is_empty() {
                bootstrap_error!("❌ 配置验证发现问题:");
                for (i, err) in fatal.iter().enumerate() {
                    bootstrap_error!("  {}. ❌ {}", i + 1, err);
                }
                return Err(Error::custom("配置验证失败，请修复上述错误".to_string()));
            }
        }

        Ok(config)
    }

    /// 运行应用程序的主入口
    async fn run_application(config_path: &Path) -> Result<()> {
        bootstrap_info!("📄 加载配置文件: {:?}", config_path);
        let config = Self::load_config(config_path)?;

        // ensure sqlite_path directory exists
        if !config.sqlite_path.exists() {
            std::fs::create_dir_all(&config.sqlite_path).with_context(|| {
                format!(
                    "Failed to create SQLite data directory: {}",
                    config.sqlite_path.display()
                )
            })?;
        }

        // 初始化可观测性系统
        let _observability_guard = init_observability(&config)?;

        Self::run_services(config).await
    }

    /// 运行服务直到收到关闭信号
    async fn run_services(config: MacgateConfig) -> Result<()> {
        info!("🚀 启动 macgate '{}' (env: {})", config.name, config.env);

        // 初始化全局关闭通道（供所有服务共享）
        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(10);

        // 安装 Ctrl-C 处理器，确保任何阶段都能广播关闭
        setup_ctrl_c_handler(shutdown_tx.clone()).await;

        // 初始化 Prometheus metrics registry
        if let Err(e) = macgate_common::metrics::register_metrics() {
            warn!(
                "Prometheus metrics registration warning (may already be registered): {}",
                e
            );
        }
        info!("✅ Prometheus metrics registry 初始化成功");

        let mut service_manager = ServiceManager::new(config.clone(), shutdown_tx.clone());
        service_manager.add_service(Box::new(GateHttpService::new(config.clone())));

        let handles = service_manager
            .start_all()
            .await
            .map_err(|e| Error::service_startup(format!("{e:#}")))?;

        Self::display_service_info(&service_manager);

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Service task terminated unexpectedly: {}", e);
                let _ = shutdown_tx.send(());
            }
        }
        service_manager.stop_all().await?;

        info!("🛑 所有服务已安全关闭");
        Ok(())
    }

    /// 显示服务信息
    fn display_service_info(service_manager: &ServiceManager) {
        info!("✅ 所有服务已启动");

        if let Some(addr) = service_manager.local_addr() {
            let http_url = format!("http://{addr}");
            info!("📡 HTTP 服务器监听在: {}", http_url);
            info!("🔧 可用的API端点:");
            info!("  - POST {}/api (X-HMAC header)", http_url);
            info!("  - GET  {}/logs", http_url);
            info!("  - GET  {}/health", http_url);
            info!("  - GET  {}/metrics", http_url);
        }
    }

    /// 签名并发送一个演示请求，打印状态码和响应体
    async fn run_demo(config_path: &Path, url: Option<&str>) -> Result<()> {
        let config = MacgateConfig::from_file(config_path)?;
        let secret = config.gate.resolve_secret()?;

        let endpoint = match url {
            Some(url) => url.to_string(),
            None => {
                let bind = &config.bind.http;
                let host = if bind.ip == "0.0.0.0" {
                    "127.0.0.1"
                } else {
                    bind.ip.as_str()
                };
                format!("http://{}:{}", host, bind.port)
            }
        };

        let client = Client::new(
            &ClientConfig {
                endpoint,
                timeout_seconds: 10,
            },
            secret,
        )?;

        bootstrap_info!("📤 发送演示请求到 {}/api", client.endpoint());
        let (status, response, body) = client.send_envelope("transfer", 1000).await?;

        bootstrap_info!("  请求体: {}", body);
        bootstrap_info!("  X-HMAC: {}", client.sign(body.as_bytes()));
        bootstrap_info!("  状态码: {}", status);
        bootstrap_info!(
            "  响应体: {}",
            serde_json::to_string(&response).unwrap_or_default()
        );

        Ok(())
    }
}

/// 设置Ctrl-C信号处理程序
async fn setup_ctrl_c_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听Ctrl-C信号: {}", e);
            return;
        }
        info!("收到Ctrl-C信号，开始优雅关闭...");
        let _ = shutdown_tx.send(());
    });
}
