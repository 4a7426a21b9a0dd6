//! 单元测试用的内存链客户端与通知器

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::json;

use crate::{
    domain::{
        chain::{Amount, ChainAccount, ChainKind, FeeEstimate},
        derivation::derive_account,
    },
    error::ForwardError,
    service::{
        chain_client::{classify_submission, ChainClient, PreparedTransfer, TransferResult},
        forward_executor::ForwardOutcome,
        notifier::ForwardNotifier,
    },
};

pub const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const EVM_DESTINATION: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb6";
pub const TRON_DESTINATION: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

pub fn account(chain: ChainKind) -> ChainAccount {
    derive_account(MNEMONIC, chain, 0).unwrap()
}

pub fn destination(chain: ChainKind) -> &'static str {
    match chain {
        ChainKind::Evm => EVM_DESTINATION,
        ChainKind::Tron => TRON_DESTINATION,
    }
}

#[derive(Debug, Clone)]
pub enum SubmitBehavior {
    Accept(&'static str),
    AcceptWithoutId,
    Reject(&'static str),
    NetworkError,
    Hang,
    /// 签名前的准备阶段（nonce / createtransaction）卡住
    HangBeforeBroadcast,
}

pub struct FakeChainClient {
    chain: ChainKind,
    balance: Option<Amount>,
    fee: FeeEstimate,
    submit: SubmitBehavior,
    balance_delay: Option<Duration>,
    panic_on_balance: bool,
    pub balance_calls: AtomicUsize,
    pub fee_calls: AtomicUsize,
    pub submissions: Mutex<Vec<(String, Amount)>>,
}

impl FakeChainClient {
    pub fn new(chain: ChainKind, balance: Amount) -> Self {
        Self {
            chain,
            balance: Some(balance),
            fee: FeeEstimate::flat(0),
            submit: SubmitBehavior::Accept("0xfeed"),
            balance_delay: None,
            panic_on_balance: false,
            balance_calls: AtomicUsize::new(0),
            fee_calls: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// 余额查询返回网络错误
    pub fn unreachable(chain: ChainKind) -> Self {
        Self {
            balance: None,
            ..Self::new(chain, 0)
        }
    }

    pub fn with_fee(mut self, fee: FeeEstimate) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_submit(mut self, submit: SubmitBehavior) -> Self {
        self.submit = submit;
        self
    }

    pub fn with_balance_delay(mut self, delay: Duration) -> Self {
        self.balance_delay = Some(delay);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_balance = true;
        self
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    fn chain(&self) -> ChainKind {
        self.chain
    }

    async fn get_balance(&self, _account: &ChainAccount) -> Result<Amount, ForwardError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_balance {
            panic!("fake client panicked");
        }
        if let Some(delay) = self.balance_delay {
            tokio::time::sleep(delay).await;
        }
        self.balance
            .ok_or_else(|| ForwardError::network(self.chain, "connection refused"))
    }

    async fn estimate_fee(&self) -> Result<FeeEstimate, ForwardError> {
        self.fee_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fee)
    }

    async fn prepare_transfer(
        &self,
        _from: &ChainAccount,
        to: &str,
        amount: Amount,
        fee: &FeeEstimate,
    ) -> Result<PreparedTransfer, ForwardError> {
        if let SubmitBehavior::HangBeforeBroadcast = self.submit {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(PreparedTransfer {
            to: to.to_string(),
            amount,
            fee: *fee,
            payload: json!("signed"),
        })
    }

    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<TransferResult, ForwardError> {
        self.submissions
            .lock()
            .unwrap()
            .push((prepared.to.clone(), prepared.amount));
        match &self.submit {
            SubmitBehavior::Accept(id) => Ok(classify_submission(
                json!({ "result": true, "txid": id }),
                Some(id.to_string()),
            )),
            SubmitBehavior::AcceptWithoutId => {
                Ok(classify_submission(json!({ "accepted": true }), None))
            }
            SubmitBehavior::Reject(reason) => Err(ForwardError::rejected(self.chain, *reason)),
            SubmitBehavior::NetworkError => {
                Err(ForwardError::network(self.chain, "broadcast failed"))
            }
            SubmitBehavior::Hang | SubmitBehavior::HangBeforeBroadcast => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ForwardError::network(self.chain, "unreachable"))
            }
        }
    }
}

/// 记录收到的通知
#[derive(Default)]
pub struct RecordingNotifier {
    pub outcomes: Mutex<Vec<(String, ForwardOutcome)>>,
    pub shutdowns: AtomicUsize,
}

impl RecordingNotifier {
    pub fn outcome_count(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }
}

#[async_trait]
impl ForwardNotifier for RecordingNotifier {
    async fn notify_shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    async fn notify_outcome(
        &self,
        account: &ChainAccount,
        _destination: &str,
        outcome: &ForwardOutcome,
    ) {
        self.outcomes
            .lock()
            .unwrap()
            .push((account.label(), outcome.clone()));
    }
}
