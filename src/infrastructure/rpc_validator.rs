// RPC响应校验模块 - 防止链上数据污染

use anyhow::{Context, Result};

/// 验证RPC返回的余额值（十六进制 quantity）
pub fn validate_balance(balance_hex: &str) -> Result<u128> {
    // 最大余额：10^30 wei（约 1万亿 ETH），超过视为异常响应
    const MAX_REASONABLE_BALANCE: u128 = 1_000_000_000_000_000_000_000_000_000_000;

    let balance = parse_hex_u128(balance_hex).context("Failed to parse balance from hex")?;
    if balance > MAX_REASONABLE_BALANCE {
        anyhow::bail!("Balance exceeds reasonable maximum: {}", balance);
    }

    Ok(balance)
}

/// 验证RPC返回的gas价格
pub fn validate_gas_price(gas_price_hex: &str) -> Result<u128> {
    // 10_000 gwei 以上视为异常
    const MAX_REASONABLE_GAS_PRICE: u128 = 10_000_000_000_000;

    let gas_price = parse_hex_u128(gas_price_hex).context("Failed to parse gas price from hex")?;
    if gas_price > MAX_REASONABLE_GAS_PRICE {
        anyhow::bail!("Gas price exceeds reasonable maximum: {}", gas_price);
    }

    Ok(gas_price)
}

/// 验证RPC返回的nonce / chainId 等 u64 quantity
pub fn validate_u64_quantity(value_hex: &str) -> Result<u64> {
    let value = value_hex.trim_start_matches("0x");

    // u64最多16个十六进制字符
    if value.is_empty() || value.len() > 16 {
        anyhow::bail!("Invalid quantity length: {}", value.len());
    }

    u64::from_str_radix(value, 16).context("Failed to parse quantity from hex")
}

/// 验证交易哈希格式（32字节 = 64个十六进制字符）
pub fn validate_tx_hash(tx_hash: &str) -> Result<String> {
    let hash = tx_hash.trim_start_matches("0x");

    if hash.len() != 64 {
        anyhow::bail!(
            "Invalid transaction hash length: expected 64, got {}",
            hash.len()
        );
    }

    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid transaction hash format: contains non-hex characters");
    }

    Ok(format!("0x{}", hash.to_lowercase()))
}

/// 验证JSON-RPC响应格式，返回 result 字段
pub fn validate_rpc_response(json: &serde_json::Value) -> Result<&serde_json::Value> {
    if let Some(error) = json.get("error") {
        let error_code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let error_msg = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        anyhow::bail!("RPC error {}: {}", error_code, error_msg);
    }

    if let Some(version) = json.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            anyhow::bail!("Unsupported JSON-RPC version: {:?}", version);
        }
    }

    json.get("result")
        .context("Missing result field in RPC response")
}

fn parse_hex_u128(value_hex: &str) -> Result<u128> {
    let value = value_hex
        .strip_prefix("0x")
        .context("Quantity must be 0x-prefixed")?;

    // u128 最多 32 个十六进制字符
    if value.is_empty() || value.len() > 32 {
        anyhow::bail!("Invalid quantity length: {}", value.len());
    }

    Ok(u128::from_str_radix(value, 16)?)
}
