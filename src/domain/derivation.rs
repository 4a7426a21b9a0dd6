//! 钱包派生策略
//!
//! 从 BIP39 助记词为每条链派生签名密钥与地址

use anyhow::{Context, Result};
use bip39::{Language, Mnemonic};
use coins_bip32::path::DerivationPath;
use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

use crate::{
    domain::chain::{ChainAccount, ChainKind},
    utils::address_validator::TRON_ADDRESS_PREFIX,
};

/// 钱包派生策略 trait
pub trait DerivationStrategy: Send + Sync {
    /// 从助记词派生账户
    ///
    /// # Arguments
    /// * `mnemonic` - BIP39 助记词
    /// * `index` - BIP44 地址索引
    fn derive_account(&self, mnemonic: &str, index: u32) -> Result<ChainAccount>;
}

/// 解析助记词并生成种子（不使用 passphrase）
fn mnemonic_to_seed(mnemonic: &str) -> Result<[u8; 64]> {
    let mnemonic =
        Mnemonic::parse_in(Language::English, mnemonic.trim()).context("Invalid mnemonic")?;
    Ok(mnemonic.to_seed(""))
}

/// 按 BIP32 路径派生 secp256k1 私钥
fn derive_signing_key(seed: &[u8], path: &str) -> Result<SigningKey> {
    use coins_bip32::prelude::*;

    let derivation_path = path
        .parse::<DerivationPath>()
        .context("Invalid derivation path")?;

    let master_key = XPriv::root_from_seed(seed, None).context("Failed to derive master key")?;

    let derived_key = master_key
        .derive_path(&derivation_path)
        .context("Failed to derive key")?;

    // XPriv 实现 AsRef<SigningKey>
    let signing_key: &SigningKey = derived_key.as_ref();
    Ok(signing_key.clone())
}

/// 未压缩公钥（去掉 0x04 前缀）的 Keccak256 后 20 字节
///
/// EVM 与 Tron 共用同一套地址哈希，区别只在编码
pub fn public_key_hash(signing_key: &SigningKey) -> [u8; 20] {
    let encoded = signing_key.verifying_key().to_encoded_point(false);
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EVM 策略: m/44'/60'/0'/0/index，地址 0x + hex
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EvmStrategy;

impl DerivationStrategy for EvmStrategy {
    fn derive_account(&self, mnemonic: &str, index: u32) -> Result<ChainAccount> {
        let seed = mnemonic_to_seed(mnemonic)?;
        let signing_key = derive_signing_key(&seed, &ChainKind::Evm.derivation_path(index))?;

        let address = format!("0x{}", hex::encode(public_key_hash(&signing_key)));

        Ok(ChainAccount::new(ChainKind::Evm, index, address, signing_key))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tron 策略: m/44'/195'/0'/0/index，地址 Base58Check(0x41 + hash20)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TronStrategy;

impl DerivationStrategy for TronStrategy {
    fn derive_account(&self, mnemonic: &str, index: u32) -> Result<ChainAccount> {
        let seed = mnemonic_to_seed(mnemonic)?;
        let signing_key = derive_signing_key(&seed, &ChainKind::Tron.derivation_path(index))?;

        let mut payload = Vec::with_capacity(21);
        payload.push(TRON_ADDRESS_PREFIX);
        payload.extend_from_slice(&public_key_hash(&signing_key));
        let address = bs58::encode(payload).with_check().into_string();

        Ok(ChainAccount::new(ChainKind::Tron, index, address, signing_key))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 策略工厂
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DerivationStrategyFactory;

impl DerivationStrategyFactory {
    pub fn create_strategy(chain: ChainKind) -> Box<dyn DerivationStrategy> {
        match chain {
            ChainKind::Evm => Box::new(EvmStrategy),
            ChainKind::Tron => Box::new(TronStrategy),
        }
    }
}

/// 便捷入口：按链派生账户
pub fn derive_account(mnemonic: &str, chain: ChainKind, index: u32) -> Result<ChainAccount> {
    DerivationStrategyFactory::create_strategy(chain)
        .derive_account(mnemonic, index)
        .with_context(|| format!("Failed to derive {} account #{}", chain, index))
}
