//! 转发决策引擎
//!
//! 纯计算：给定余额与手续费预估，决定是否转发以及转发金额。
//! 不做任何 I/O，相同输入永远得到相同输出。
//!
//! 手续费预留策略（按链配置）：
//! - `Estimated`：预留本轮查询到的实际手续费（+ 可选安全边际），用于 EVM，
//!   gasPrice × gasLimit 每次都可以精确计算
//! - `Fixed`：预留固定金额，用于 Tron，带宽/能量费用难以逐笔精确定价
//!
//! 无论哪种策略，引擎都会在阈值之外再次检查 `balance > reserve`，
//! 防止两次读取之间手续费飙升导致转出非正金额。

use crate::{
    domain::chain::{Amount, FeeEstimate},
    error::ForwardError,
};

/// 跳过转发的原因（不是错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 余额 <= 最低阈值
    BelowThreshold,
    /// 余额 <= 预留手续费
    FeeExceedsBalance,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelowThreshold => "balance_below_threshold",
            Self::FeeExceedsBalance => "fee_exceeds_balance",
        }
    }
}

/// 转发决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDecision {
    /// 转发 `amount`（0 < amount <= balance）
    Forward { amount: Amount },
    Skip(SkipReason),
}

impl ForwardDecision {
    pub fn should_forward(&self) -> bool {
        matches!(self, Self::Forward { .. })
    }

    /// 仅在转发时有值
    pub fn amount(&self) -> Option<Amount> {
        match self {
            Self::Forward { amount } => Some(*amount),
            Self::Skip(_) => None,
        }
    }
}

/// 决策规则：当且仅当 `balance > min_threshold` 且 `balance > reserve` 时转发，
/// 转发金额为 `balance - reserve`
pub fn decide(balance: Amount, reserve: Amount, min_threshold: Amount) -> ForwardDecision {
    if balance <= min_threshold {
        return ForwardDecision::Skip(SkipReason::BelowThreshold);
    }
    if balance <= reserve {
        return ForwardDecision::Skip(SkipReason::FeeExceedsBalance);
    }

    ForwardDecision::Forward {
        amount: balance - reserve,
    }
}

/// 手续费预留策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeReservation {
    /// 预留实际预估手续费 + 安全边际
    Estimated { safety_margin: Amount },
    /// 预留固定金额
    Fixed { reserve: Amount },
}

/// 单条链的转发策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardPolicy {
    min_threshold: Amount,
    reservation: FeeReservation,
}

impl ForwardPolicy {
    /// 创建策略并在配置阶段校验约束
    ///
    /// 固定预留必须严格小于阈值，否则属于启动配置错误
    pub fn new(min_threshold: Amount, reservation: FeeReservation) -> Result<Self, ForwardError> {
        if let FeeReservation::Fixed { reserve } = reservation {
            if reserve >= min_threshold {
                return Err(ForwardError::config(format!(
                    "reserve ({}) must be strictly less than the minimum threshold ({})",
                    reserve, min_threshold
                )));
            }
        }

        Ok(Self {
            min_threshold,
            reservation,
        })
    }

    pub fn min_threshold(&self) -> Amount {
        self.min_threshold
    }

    pub fn reservation(&self) -> FeeReservation {
        self.reservation
    }

    /// 将链相关的手续费预估归一化为单一预留金额
    pub fn reserve_for(&self, fee: &FeeEstimate) -> Amount {
        match self.reservation {
            FeeReservation::Estimated { safety_margin } => fee.fee.saturating_add(safety_margin),
            FeeReservation::Fixed { reserve } => reserve,
        }
    }

    pub fn evaluate(&self, balance: Amount, fee: &FeeEstimate) -> ForwardDecision {
        decide(balance, self.reserve_for(fee), self.min_threshold)
    }
}
