//! 链与账户模型
//!
//! 支持的两条链：账户模型的 EVM 链和带宽/能量模型的 Tron 链

use std::fmt;

use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};

/// 链上最小单位金额（wei / sun）
pub type Amount = u128;

/// 链类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// EVM 账户模型链 (ETH)
    Evm,
    /// Tron 资源模型链 (TRX)
    Tron,
}

impl ChainKind {
    pub const ALL: [ChainKind; 2] = [ChainKind::Evm, ChainKind::Tron];

    /// 原生币符号
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Evm => "ETH",
            Self::Tron => "TRX",
        }
    }

    /// 最小单位小数位（wei = 18，sun = 6）
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Evm => 18,
            Self::Tron => 6,
        }
    }

    /// SLIP-44 coin type
    pub fn coin_type(&self) -> u32 {
        match self {
            Self::Evm => 60,
            Self::Tron => 195,
        }
    }

    /// BIP44 派生路径 m/44'/coin'/0'/0/index
    pub fn derivation_path(&self, index: u32) -> String {
        format!("m/44'/{}'/0'/0/{}", self.coin_type(), index)
    }

    /// 最小单位名称
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Evm => "wei",
            Self::Tron => "sun",
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 托管钱包账户
///
/// 启动时由助记词派生一次，进程生命周期内不可变。
/// 私钥由 k256 在 drop 时清零，Debug 输出中不包含密钥。
#[derive(Clone)]
pub struct ChainAccount {
    pub chain: ChainKind,
    /// BIP44 地址索引
    pub index: u32,
    /// 链上地址（EVM: 0x 小写 hex；Tron: T 开头 Base58Check）
    pub address: String,
    signing_key: SigningKey,
}

impl ChainAccount {
    pub fn new(chain: ChainKind, index: u32, address: String, signing_key: SigningKey) -> Self {
        Self {
            chain,
            index,
            address,
            signing_key,
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// 日志中使用的简短标签，例如 `ETH#0`
    pub fn label(&self) -> String {
        format!("{}#{}", self.chain, self.index)
    }
}

impl fmt::Debug for ChainAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainAccount")
            .field("chain", &self.chain)
            .field("index", &self.index)
            .field("address", &self.address)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// 手续费预估
///
/// 每次尝试都重新获取；EVM 带有 gas 参数，Tron 只有 fee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    /// 总手续费（最小单位）
    pub fee: Amount,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
}

impl FeeEstimate {
    /// 固定手续费（Tron 带宽费用）
    pub fn flat(fee: Amount) -> Self {
        Self {
            fee,
            gas_limit: None,
            gas_price: None,
        }
    }

    /// gasPrice × gasLimit
    pub fn from_gas(gas_price: u128, gas_limit: u64) -> Self {
        Self {
            fee: gas_price.saturating_mul(gas_limit as u128),
            gas_limit: Some(gas_limit),
            gas_price: Some(gas_price),
        }
    }
}
