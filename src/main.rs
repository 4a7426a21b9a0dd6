//! Wallet Forwarder 主入口

use anyhow::Result;
use tokio::sync::watch;
use wallet_forwarder::{
    config::ForwarderConfig,
    infrastructure::{env_validator::EnvValidator, logging},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ✅ 1. 加载环境变量
    dotenvy::dotenv().ok();

    // ✅ 2. 加载配置（CONFIG_PATH 指向的 TOML 文件优先）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config_file = ForwarderConfig::config_file(config_path.as_deref());
    let config = match ForwarderConfig::from_env_and_file(config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_default_logging();
            tracing::error!("❌ Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    // ✅ 3. 初始化日志
    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        logging::init_default_logging();
    }

    tracing::info!("🚀 Starting Wallet Forwarder");
    if let (Some(path), None) = (&config_path, &config_file) {
        tracing::warn!("⚠️ CONFIG_PATH {} not found, using environment variables", path);
    }

    // ✅ 4. 验证环境变量（仅在未使用配置文件时）
    if config_file.is_none() {
        EnvValidator::validate_and_log()?;
    }

    // ✅ 5. 派生钱包并构建调度器
    let state = AppState::new(config).map_err(|e| {
        tracing::error!("❌ Startup failed: {:#}", e);
        e
    })?;

    for account in &state.accounts {
        tracing::info!(
            wallet = %account.label(),
            address = %account.address,
            path = %account.chain.derivation_path(account.index),
            "✅ Wallet loaded"
        );
    }
    if state.config.scheduler.dry_run {
        tracing::warn!("⚠️ DRY_RUN enabled, no transaction will be submitted");
    }

    state.notifier.notify_startup(&state.accounts).await;

    // ✅ 6. 关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // ✅ 7. 运行主循环
    state.scheduler.run(shutdown_rx).await;

    tracing::info!("👋 Wallet Forwarder stopped");
    Ok(())
}

/// Ctrl-C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
