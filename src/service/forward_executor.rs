//! 单钱包单次转发
//!
//! 流程：查余额 → 查手续费 → 决策 → 提交 → 判定结果 → 日志/指标/通知。
//! 任何错误都被转换为 `ForwardOutcome`，不会向调度器传播。

use std::{future::Future, sync::Arc, time::Duration};

use serde_json::{json, Value};

use crate::{
    config::DEFAULT_RPC_TIMEOUT_MS,
    domain::{
        chain::{Amount, ChainAccount, ChainKind},
        forward_policy::{ForwardDecision, ForwardPolicy, SkipReason},
    },
    error::ForwardError,
    metrics,
    service::{chain_client::ChainClient, notifier::ForwardNotifier},
    utils::{address_validator::AddressValidator, amount_format::format_amount},
};

/// 单次尝试的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    /// 已提交并拿到交易 ID
    Forwarded { tx_id: String, amount: Amount },
    Skipped(SkipReason),
    /// dry-run 模式下本应转发
    DryRun { amount: Amount },
    /// 余额/手续费查询失败，或节点拒绝
    Failed { kind: &'static str, message: String },
    /// 节点接受但没有交易 ID，资金可能已转出
    Ambiguous { amount: Amount, raw: Value },
}

impl ForwardOutcome {
    fn from_error(err: &ForwardError) -> Self {
        match err {
            ForwardError::SubmissionAmbiguous { raw, .. } => Self::Ambiguous {
                amount: 0,
                raw: raw.clone(),
            },
            other => Self::Failed {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Forwarded { .. } => "forwarded",
            Self::Skipped(_) => "skipped",
            Self::DryRun { .. } => "dry_run",
            Self::Failed { .. } => "failed",
            Self::Ambiguous { .. } => "ambiguous",
        }
    }

    pub fn is_forwarded(&self) -> bool {
        matches!(self, Self::Forwarded { .. })
    }
}

pub struct ForwardExecutor {
    account: ChainAccount,
    destination: String,
    client: Arc<dyn ChainClient>,
    policy: ForwardPolicy,
    notifier: Arc<dyn ForwardNotifier>,
    call_timeout: Duration,
    dry_run: bool,
}

impl ForwardExecutor {
    /// 创建执行器；目标地址非法或与被归集钱包相同属于配置错误
    pub fn new(
        account: ChainAccount,
        destination: impl Into<String>,
        client: Arc<dyn ChainClient>,
        policy: ForwardPolicy,
        notifier: Arc<dyn ForwardNotifier>,
    ) -> Result<Self, ForwardError> {
        let destination = destination.into();
        let chain = account.chain;

        if client.chain() != chain {
            return Err(ForwardError::config(format!(
                "{} wallet cannot use a {} client",
                chain,
                client.chain()
            )));
        }

        if !AddressValidator::validate(chain, &destination) {
            return Err(ForwardError::config(format!(
                "invalid {} destination address: {}",
                chain, destination
            )));
        }

        if AddressValidator::same_address(chain, &destination, &account.address) {
            return Err(ForwardError::config(format!(
                "{} destination {} is the swept wallet itself",
                chain, destination
            )));
        }

        Ok(Self {
            account,
            destination,
            client,
            policy,
            notifier,
            call_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            dry_run: false,
        })
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn account(&self) -> &ChainAccount {
        &self.account
    }

    pub fn chain(&self) -> ChainKind {
        self.account.chain
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// 执行一次转发尝试
    ///
    /// 每次调用至多：一次余额查询、一次手续费查询、一次提交、一次通知
    pub async fn run_once(&self) -> ForwardOutcome {
        metrics::count_tick(self.chain());

        let outcome = self.attempt().await;
        self.record(&outcome);

        if !matches!(outcome, ForwardOutcome::Skipped(_)) {
            self.notifier
                .notify_outcome(&self.account, &self.destination, &outcome)
                .await;
        }

        outcome
    }

    async fn attempt(&self) -> ForwardOutcome {
        let balance = match self
            .bounded("get_balance", self.client.get_balance(&self.account))
            .await
        {
            Ok(balance) => balance,
            Err(err) => return ForwardOutcome::from_error(&err),
        };

        let fee = match self
            .bounded("estimate_fee", self.client.estimate_fee())
            .await
        {
            Ok(fee) => fee,
            Err(err) => return ForwardOutcome::from_error(&err),
        };

        let reserve = self.policy.reserve_for(&fee);
        let amount = match self.policy.evaluate(balance, &fee) {
            ForwardDecision::Forward { amount } => amount,
            ForwardDecision::Skip(reason) => {
                tracing::info!(
                    wallet = %self.account.label(),
                    balance = %balance,
                    reserve = %reserve,
                    min_threshold = %self.policy.min_threshold(),
                    reason = reason.as_str(),
                    "ℹ️ Nothing to forward"
                );
                return ForwardOutcome::Skipped(reason);
            }
        };

        tracing::debug!(
            wallet = %self.account.label(),
            balance = %balance,
            fee = %fee.fee,
            reserve = %reserve,
            amount = %amount,
            "Forward decision"
        );

        if self.dry_run {
            return ForwardOutcome::DryRun { amount };
        }

        // 签名阶段尚未发出任何交易，超时或失败都按普通失败处理
        let prepared = match self
            .bounded(
                "prepare_transfer",
                self.client
                    .prepare_transfer(&self.account, &self.destination, amount, &fee),
            )
            .await
        {
            Ok(prepared) => prepared,
            Err(err) => return ForwardOutcome::from_error(&err),
        };

        let submission =
            tokio::time::timeout(self.call_timeout, self.client.broadcast(&prepared)).await;

        match submission {
            // 超时后无法确认节点是否已收到交易
            Err(_) => ForwardOutcome::Ambiguous {
                amount,
                raw: json!({
                    "error": format!("broadcast timed out after {:?}", self.call_timeout)
                }),
            },
            Ok(Err(err)) => match ForwardOutcome::from_error(&err) {
                ForwardOutcome::Ambiguous { raw, .. } => ForwardOutcome::Ambiguous { amount, raw },
                other => other,
            },
            Ok(Ok(result)) => match result.tx_id {
                Some(tx_id) if result.success => ForwardOutcome::Forwarded { tx_id, amount },
                _ => ForwardOutcome::Ambiguous {
                    amount,
                    raw: result.raw_response,
                },
            },
        }
    }

    async fn bounded<T, F>(&self, call: &'static str, fut: F) -> Result<T, ForwardError>
    where
        F: Future<Output = Result<T, ForwardError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::network(
                self.chain(),
                format!("{} timed out after {:?}", call, self.call_timeout),
            )),
        }
    }

    fn record(&self, outcome: &ForwardOutcome) {
        let chain = self.chain();
        let wallet = self.account.label();

        match outcome {
            ForwardOutcome::Forwarded { tx_id, amount } => {
                metrics::count_forwarded(chain, *amount);
                tracing::info!(
                    wallet = %wallet,
                    to = %self.destination,
                    amount = %amount,
                    tx_id = %tx_id,
                    "🟢 {} forwarded",
                    format_amount(chain, *amount)
                );
            }
            ForwardOutcome::Skipped(_) => metrics::count_skipped(chain),
            ForwardOutcome::DryRun { amount } => {
                metrics::count_dry_run(chain);
                tracing::info!(
                    wallet = %wallet,
                    to = %self.destination,
                    amount = %amount,
                    "🧪 Dry run: would forward {}",
                    format_amount(chain, *amount)
                );
            }
            ForwardOutcome::Failed { kind, message } => {
                metrics::count_failed(chain, *kind);
                tracing::warn!(
                    wallet = %wallet,
                    error_kind = kind,
                    "❌ Forward attempt failed: {}",
                    message
                );
            }
            ForwardOutcome::Ambiguous { amount, raw } => {
                metrics::count_ambiguous(chain);
                tracing::error!(
                    wallet = %wallet,
                    to = %self.destination,
                    amount = %amount,
                    error_kind = "SubmissionAmbiguous",
                    raw_response = %raw,
                    "⚠️ Transfer accepted without a transaction id, funds may have moved"
                );
            }
        }
    }
}
