//! 金额展示：最小单位 → 整币（仅用于日志和通知，不参与计算）

use rust_decimal::Decimal;

use crate::domain::chain::{Amount, ChainKind};

/// 格式化为 `1.5 ETH`；超出 Decimal 表示范围时退回最小单位
pub fn format_amount(chain: ChainKind, amount: Amount) -> String {
    let whole = i128::try_from(amount)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, chain.decimals()).ok());

    match whole {
        Some(value) => format!("{} {}", value.normalize(), chain.symbol()),
        None => format!("{} {}", amount, chain.unit()),
    }
}
