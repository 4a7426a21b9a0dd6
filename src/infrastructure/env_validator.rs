//! 环境变量验证器
//! 确保必需的环境变量已设置，并在启动时验证配置

use std::env;

/// Tron 与 EVM 目标地址各自决定对应链是否启用
const CHAIN_SWITCHES: [&str; 2] = ["ETH_FORWARD_TO", "TRX_FORWARD_TO"];

/// 数值型变量（格式错误会在配置加载时失败，这里提前汇总报告）
const NUMERIC_VARS: [&str; 8] = [
    "POLL_INTERVAL_MS",
    "RPC_TIMEOUT_MS",
    "ETH_MIN_THRESHOLD_WEI",
    "ETH_FEE_MARGIN_WEI",
    "ETH_GAS_LIMIT",
    "ETH_CHAIN_ID",
    "TRX_MIN_THRESHOLD_SUN",
    "TRX_RESERVE_SUN",
];

#[derive(Debug)]
pub struct EnvValidator;

impl EnvValidator {
    /// 验证所有必需的环境变量
    pub fn validate_all() -> Result<(), Vec<String>> {
        Self::validate_with(|key| env::var(key).ok())
    }

    /// 使用自定义读取函数验证（便于测试）
    pub fn validate_with<F>(lookup: F) -> Result<(), Vec<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut errors = Vec::new();

        if get("SEED_PHRASE").is_none() {
            errors.push("SEED_PHRASE is required but not set".to_string());
        }

        if CHAIN_SWITCHES.iter().all(|key| get(key).is_none()) {
            errors.push("At least one of ETH_FORWARD_TO or TRX_FORWARD_TO must be set".to_string());
        }

        // 启用 EVM 时必须有 RPC 地址
        if get("ETH_FORWARD_TO").is_some() {
            match get("ETH_RPC_URL") {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(_) => {
                    errors.push("ETH_RPC_URL must start with http:// or https://".to_string())
                }
                None => errors
                    .push("ETH_RPC_URL is required when ETH_FORWARD_TO is set".to_string()),
            }
        }

        // 验证 TRON_API_URL 格式（如果设置）
        if let Some(url) = get("TRON_API_URL") {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push("TRON_API_URL must start with http:// or https://".to_string());
            }
        }

        for key in NUMERIC_VARS {
            if let Some(value) = get(key) {
                if value.trim().parse::<u128>().is_err() {
                    errors.push(format!("{} must be a non-negative integer", key));
                }
            }
        }

        // Telegram 需要同时设置
        match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Only one of TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID is set, notifications will be disabled"
                );
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 验证并打印错误
    pub fn validate_and_log() -> Result<(), anyhow::Error> {
        match Self::validate_all() {
            Ok(()) => {
                tracing::info!("Environment variables validation passed");
                Ok(())
            }
            Err(errors) => {
                for error in &errors {
                    tracing::error!("{}", error);
                }
                Err(anyhow::anyhow!(
                    "Environment validation failed: {} error(s)",
                    errors.len()
                ))
            }
        }
    }
}
