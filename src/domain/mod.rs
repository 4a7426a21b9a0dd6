//! Domain 模块
//!
//! 链账户模型、密钥派生与转发决策（纯逻辑，无 I/O）

pub mod chain;
pub mod derivation;
pub mod forward_policy;

// 重新导出常用类型
pub use chain::{Amount, ChainAccount, ChainKind, FeeEstimate};
pub use derivation::{derive_account, DerivationStrategy, DerivationStrategyFactory};
pub use forward_policy::{decide, FeeReservation, ForwardDecision, ForwardPolicy, SkipReason};
