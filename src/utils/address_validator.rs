//! 地址验证模块
//!
//! 目标地址在启动时校验，非法地址属于配置错误

use crate::domain::chain::ChainKind;

/// Tron 主网地址版本字节
pub const TRON_ADDRESS_PREFIX: u8 = 0x41;

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证地址格式
    pub fn validate(chain: ChainKind, address: &str) -> bool {
        match chain {
            ChainKind::Evm => Self::validate_evm_address(address),
            ChainKind::Tron => Self::validate_tron_address(address),
        }
    }

    /// 地址比较（EVM 不区分大小写，Tron Base58 区分）
    pub fn same_address(chain: ChainKind, a: &str, b: &str) -> bool {
        match chain {
            ChainKind::Evm => a.eq_ignore_ascii_case(b),
            ChainKind::Tron => a == b,
        }
    }

    /// 验证EVM地址（支持EIP-55 Checksum）
    fn validate_evm_address(address: &str) -> bool {
        // 1. 基本格式检查
        if !address.starts_with("0x") || address.len() != 42 {
            return false;
        }

        // 2. 验证hex字符
        let hex_part = &address[2..];
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 3. 混合大小写时校验 EIP-55
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Self::verify_eip55_checksum(address);
        }

        true
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(address: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let addr_lower = address[2..].to_lowercase();
        let hash = Keccak256::digest(addr_lower.as_bytes());

        address[2..].chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let hash_byte = hash[i / 2];
            let hash_nibble = if i % 2 == 0 {
                hash_byte >> 4
            } else {
                hash_byte & 0x0f
            };
            ch.is_ascii_uppercase() == (hash_nibble >= 8)
        })
    }

    /// 验证Tron地址（Base58Check，21字节，0x41 前缀）
    fn validate_tron_address(address: &str) -> bool {
        if !address.starts_with('T') || address.len() != 34 {
            return false;
        }

        match bs58::decode(address).with_check(None).into_vec() {
            Ok(payload) => payload.len() == 21 && payload[0] == TRON_ADDRESS_PREFIX,
            Err(_) => false,
        }
    }
}
