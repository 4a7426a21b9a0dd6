//! 错误类型
//!
//! 只有 Configuration 在启动阶段是致命的，其余错误都限定在单个钱包的单次循环内

use crate::domain::chain::ChainKind;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// 启动配置错误（助记词缺失、目标地址非法、预留金额 >= 阈值等）
    #[error("configuration error: {0}")]
    Configuration(String),

    /// RPC 不可达、超时或响应格式异常
    #[error("{chain} network error: {message}")]
    Network { chain: ChainKind, message: String },

    /// 节点明确拒绝了交易（资金未移动）
    #[error("{chain} transfer rejected: {reason}")]
    SubmissionRejected { chain: ChainKind, reason: String },

    /// 节点接受了提交但没有返回可用的交易 ID，资金状态不确定
    #[error("{chain} transfer accepted without a usable transaction id: {raw}")]
    SubmissionAmbiguous {
        chain: ChainKind,
        raw: serde_json::Value,
    },
}

impl ForwardError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn network(chain: ChainKind, msg: impl std::fmt::Display) -> Self {
        Self::Network {
            chain,
            message: msg.to_string(),
        }
    }

    pub fn rejected(chain: ChainKind, reason: impl Into<String>) -> Self {
        Self::SubmissionRejected {
            chain,
            reason: reason.into(),
        }
    }

    /// 错误分类标签（用于日志与指标）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Network { .. } => "network",
            Self::SubmissionRejected { .. } => "rejected",
            Self::SubmissionAmbiguous { .. } => "ambiguous",
        }
    }

    /// 是否只影响本次循环（下个 tick 可自动恢复）
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}
