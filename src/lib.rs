//! Wallet Forwarder - 多链余额自动归集
//!
//! 定时检查由助记词派生的 EVM / Tron 托管钱包余额，
//! 超过阈值时扣除手续费预留后转入固定目标地址

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::ForwardError;

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        config::ForwarderConfig,
        domain::{
            Amount, ChainAccount, ChainKind, FeeEstimate, FeeReservation, ForwardDecision,
            ForwardPolicy, SkipReason,
        },
        error::ForwardError,
        service::{
            ChainClient, ForwardExecutor, ForwardNotifier, ForwardOutcome, Scheduler,
            TransferResult,
        },
    };
}
