//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    domain::{
        chain::{Amount, ChainKind},
        forward_policy::{FeeReservation, ForwardPolicy},
    },
    error::ForwardError,
    utils::address_validator::AddressValidator,
};

pub const DEFAULT_TRON_API_URL: &str = "https://api.trongrid.io";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_EVM_GAS_LIMIT: u64 = 21_000;
/// 0.1 TRX
pub const DEFAULT_TRON_MIN_THRESHOLD_SUN: Amount = 100_000;
/// 约 0.05 TRX 的带宽费用
pub const DEFAULT_TRON_RESERVE_SUN: Amount = 50_000;

/// 助记词（Debug 脱敏，drop 时清零）
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SecretPhrase(String);

impl SecretPhrase {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self(phrase.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretPhrase(<redacted>)")
    }
}

impl Drop for SecretPhrase {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// 应用配置结构体
#[derive(Debug, Clone, Deserialize)]
pub struct ForwarderConfig {
    /// 建议只通过环境变量提供
    #[serde(default)]
    pub seed_phrase: SecretPhrase,
    /// BIP44 地址索引（每个索引对应每条链一个托管钱包）
    #[serde(default = "default_wallet_indices")]
    pub wallet_indices: Vec<u32>,
    #[serde(default)]
    pub evm: Option<EvmForwardConfig>,
    #[serde(default)]
    pub tron: Option<TronForwardConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

/// EVM 链转发配置
#[derive(Debug, Clone, Deserialize)]
pub struct EvmForwardConfig {
    pub rpc_url: String,
    pub destination: String,
    #[serde(default, deserialize_with = "de_amount")]
    pub min_threshold_wei: Amount,
    /// 在预估手续费之上额外预留的安全边际
    #[serde(default, deserialize_with = "de_amount")]
    pub fee_margin_wei: Amount,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// 未配置时启动时通过 eth_chainId 查询
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// Tron 链转发配置
#[derive(Debug, Clone, Deserialize)]
pub struct TronForwardConfig {
    #[serde(default = "default_tron_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub destination: String,
    #[serde(default = "default_tron_min_threshold", deserialize_with = "de_amount")]
    pub min_threshold_sun: Amount,
    #[serde(default = "default_tron_reserve", deserialize_with = "de_amount")]
    pub reserve_sun: Amount,
}

/// 调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_ms: u64,
    /// 单次 RPC 调用超时
    pub rpc_timeout_ms: u64,
    /// 只做决策，不提交交易
    pub dry_run: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// Telegram 通知配置
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// TOML 整数为 i64，金额按 u64 读取后再放宽为 Amount
fn de_amount<'de, D>(deserializer: D) -> Result<Amount, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Amount::from)
}

fn default_wallet_indices() -> Vec<u32> {
    vec![0]
}

fn default_gas_limit() -> u64 {
    DEFAULT_EVM_GAS_LIMIT
}

fn default_tron_api_url() -> String {
    DEFAULT_TRON_API_URL.to_string()
}

fn default_tron_min_threshold() -> Amount {
    DEFAULT_TRON_MIN_THRESHOLD_SUN
}

fn default_tron_reserve() -> Amount {
    DEFAULT_TRON_RESERVE_SUN
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            dry_run: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

impl EvmForwardConfig {
    /// EVM 使用实际预估手续费预留
    pub fn policy(&self) -> Result<ForwardPolicy, ForwardError> {
        ForwardPolicy::new(
            self.min_threshold_wei,
            FeeReservation::Estimated {
                safety_margin: self.fee_margin_wei,
            },
        )
    }
}

impl TronForwardConfig {
    /// Tron 使用固定预留
    pub fn policy(&self) -> Result<ForwardPolicy, ForwardError> {
        ForwardPolicy::new(
            self.min_threshold_sun,
            FeeReservation::Fixed {
                reserve: self.reserve_sun,
            },
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 环境变量读取
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 读取非空环境变量（去除首尾空白）
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 读取并解析环境变量；格式错误直接报错而不是静默使用默认值
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(None),
    }
}

fn env_flag(key: &str) -> bool {
    env_string(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_indices(raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .with_context(|| format!("WALLET_INDICES contains an invalid index: {:?}", s))
        })
        .collect()
}

impl ForwarderConfig {
    /// 从环境变量加载配置
    ///
    /// 目标地址是否配置决定对应链是否启用
    pub fn from_env() -> Result<Self> {
        let seed_phrase = SecretPhrase::new(env_string("SEED_PHRASE").unwrap_or_default());

        let wallet_indices = match env_string("WALLET_INDICES") {
            Some(raw) => parse_indices(&raw)?,
            None => default_wallet_indices(),
        };

        let evm = match env_string("ETH_FORWARD_TO") {
            Some(destination) => Some(EvmForwardConfig {
                rpc_url: env_string("ETH_RPC_URL").unwrap_or_default(),
                destination,
                min_threshold_wei: env_parse("ETH_MIN_THRESHOLD_WEI")?.unwrap_or(0),
                fee_margin_wei: env_parse("ETH_FEE_MARGIN_WEI")?.unwrap_or(0),
                gas_limit: env_parse("ETH_GAS_LIMIT")?.unwrap_or(DEFAULT_EVM_GAS_LIMIT),
                chain_id: env_parse("ETH_CHAIN_ID")?,
            }),
            None => None,
        };

        let tron = match env_string("TRX_FORWARD_TO") {
            Some(destination) => Some(TronForwardConfig {
                api_url: env_string("TRON_API_URL").unwrap_or_else(default_tron_api_url),
                api_key: env_string("TRON_API_KEY"),
                destination,
                min_threshold_sun: env_parse("TRX_MIN_THRESHOLD_SUN")?
                    .unwrap_or(DEFAULT_TRON_MIN_THRESHOLD_SUN),
                reserve_sun: env_parse("TRX_RESERVE_SUN")?.unwrap_or(DEFAULT_TRON_RESERVE_SUN),
            }),
            None => None,
        };

        let scheduler = SchedulerConfig {
            poll_interval_ms: env_parse("POLL_INTERVAL_MS")?.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            rpc_timeout_ms: env_parse("RPC_TIMEOUT_MS")?.unwrap_or(DEFAULT_RPC_TIMEOUT_MS),
            dry_run: env_flag("DRY_RUN"),
        };

        let telegram = match (env_string("TELEGRAM_BOT_TOKEN"), env_string("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            (Some(_), None) => {
                tracing::warn!("TELEGRAM_BOT_TOKEN is set but TELEGRAM_CHAT_ID is missing; Telegram notifications disabled");
                None
            }
            (None, Some(_)) => {
                tracing::warn!("TELEGRAM_CHAT_ID is set but TELEGRAM_BOT_TOKEN is missing; Telegram notifications disabled");
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            seed_phrase,
            wallet_indices,
            evm,
            tron,
            scheduler,
            logging: LoggingConfig::default(),
            telegram,
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let mut config: ForwarderConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        // 助记词不建议写入文件，文件中缺失时回退到环境变量
        if config.seed_phrase.is_empty() {
            if let Some(phrase) = env_string("SEED_PHRASE") {
                config.seed_phrase = SecretPhrase::new(phrase);
            }
        }

        Ok(config)
    }

    /// 实际生效的配置文件：路径已设置且文件存在
    pub fn config_file<P: AsRef<Path>>(path: Option<P>) -> Option<PathBuf> {
        path.map(|p| p.as_ref().to_path_buf())
            .filter(|p| p.exists())
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match Self::config_file(path) {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// 已启用的链
    pub fn enabled_chains(&self) -> Vec<ChainKind> {
        ChainKind::ALL
            .into_iter()
            .filter(|chain| match chain {
                ChainKind::Evm => self.evm.is_some(),
                ChainKind::Tron => self.tron.is_some(),
            })
            .collect()
    }

    /// 验证配置有效性（任何错误都在调度开始前终止进程）
    pub fn validate(&self) -> Result<(), ForwardError> {
        if self.seed_phrase.is_empty() {
            return Err(ForwardError::config("SEED_PHRASE is required"));
        }

        if self.evm.is_none() && self.tron.is_none() {
            return Err(ForwardError::config(
                "no chain enabled: set ETH_FORWARD_TO and/or TRX_FORWARD_TO",
            ));
        }

        if self.wallet_indices.is_empty() {
            return Err(ForwardError::config("WALLET_INDICES must not be empty"));
        }

        let mut indices = self.wallet_indices.clone();
        indices.sort_unstable();
        indices.dedup();
        if indices.len() != self.wallet_indices.len() {
            return Err(ForwardError::config("WALLET_INDICES contains duplicates"));
        }

        if self.scheduler.poll_interval_ms == 0 {
            return Err(ForwardError::config("POLL_INTERVAL_MS must be greater than 0"));
        }

        if self.scheduler.rpc_timeout_ms == 0 {
            return Err(ForwardError::config("RPC_TIMEOUT_MS must be greater than 0"));
        }

        if let Some(evm) = &self.evm {
            if !evm.rpc_url.starts_with("http://") && !evm.rpc_url.starts_with("https://") {
                return Err(ForwardError::config(
                    "ETH_RPC_URL must start with http:// or https://",
                ));
            }
            if !AddressValidator::validate(ChainKind::Evm, &evm.destination) {
                return Err(ForwardError::config(format!(
                    "ETH_FORWARD_TO is not a valid EVM address: {}",
                    evm.destination
                )));
            }
            if evm.gas_limit < DEFAULT_EVM_GAS_LIMIT {
                return Err(ForwardError::config(format!(
                    "ETH_GAS_LIMIT must be at least {}",
                    DEFAULT_EVM_GAS_LIMIT
                )));
            }
            evm.policy()?;
        }

        if let Some(tron) = &self.tron {
            if !tron.api_url.starts_with("http://") && !tron.api_url.starts_with("https://") {
                return Err(ForwardError::config(
                    "TRON_API_URL must start with http:// or https://",
                ));
            }
            if !AddressValidator::validate(ChainKind::Tron, &tron.destination) {
                return Err(ForwardError::config(format!(
                    "TRX_FORWARD_TO is not a valid Tron address: {}",
                    tron.destination
                )));
            }
            tron.policy()?;
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ForwardError::config(format!(
                "LOG_LEVEL must be one of: {:?}",
                valid_levels
            )));
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            return Err(ForwardError::config("LOG_FORMAT must be 'json' or 'text'"));
        }

        Ok(())
    }
}
