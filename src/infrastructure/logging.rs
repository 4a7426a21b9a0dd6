//! 日志系统配置模块
//! 支持结构化 JSON 日志和文本日志，RUST_LOG 优先于配置的级别

use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;

/// 初始化日志系统
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    // 设置日志级别过滤器
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // 根据配置选择日志格式
    if config.format == "json" {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(true),
            )
            .try_init()?;
    }

    Ok(())
}

/// 简化初始化（使用默认配置）
///
/// 配置加载失败时也要能输出错误日志
pub fn init_default_logging() {
    let config = LoggingConfig::default();
    init_logging(&config).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        // 回退到最基本的日志初始化
        let _ = tracing_subscriber::fmt().try_init();
    });
}
