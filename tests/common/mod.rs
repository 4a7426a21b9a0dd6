//! 测试辅助模块
//! 提供内存链客户端、记录型通知器和本地 mock 节点

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use wallet_forwarder::{
    domain::{Amount, ChainAccount, ChainKind, FeeEstimate},
    service::{
        classify_submission, ChainClient, ForwardNotifier, ForwardOutcome, PreparedTransfer,
        TransferResult,
    },
    ForwardError,
};

pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const EVM_DESTINATION: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb6";
pub const TRON_DESTINATION: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

pub fn destination(chain: ChainKind) -> &'static str {
    match chain {
        ChainKind::Evm => EVM_DESTINATION,
        ChainKind::Tron => TRON_DESTINATION,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 内存链：转账成功后余额真实减少
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct InMemoryChain {
    chain: ChainKind,
    balance: Mutex<Amount>,
    fee: FeeEstimate,
    reachable: bool,
    return_tx_id: bool,
    pub submissions: Mutex<Vec<(String, Amount)>>,
    pub balance_queries: AtomicUsize,
}

impl InMemoryChain {
    pub fn new(chain: ChainKind, balance: Amount, fee: FeeEstimate) -> Self {
        Self {
            chain,
            balance: Mutex::new(balance),
            fee,
            reachable: true,
            return_tx_id: true,
            submissions: Mutex::new(Vec::new()),
            balance_queries: AtomicUsize::new(0),
        }
    }

    pub fn unreachable(chain: ChainKind) -> Self {
        Self {
            reachable: false,
            ..Self::new(chain, 0, FeeEstimate::flat(0))
        }
    }

    /// 节点接受交易但不返回交易 ID
    pub fn without_tx_id(mut self) -> Self {
        self.return_tx_id = false;
        self
    }

    pub fn balance(&self) -> Amount {
        *self.balance.lock().unwrap()
    }

    pub fn deposit(&self, amount: Amount) {
        *self.balance.lock().unwrap() += amount;
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for InMemoryChain {
    fn chain(&self) -> ChainKind {
        self.chain
    }

    async fn get_balance(&self, _account: &ChainAccount) -> Result<Amount, ForwardError> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(ForwardError::network(self.chain, "connection refused"));
        }
        Ok(self.balance())
    }

    async fn estimate_fee(&self) -> Result<FeeEstimate, ForwardError> {
        Ok(self.fee)
    }

    async fn prepare_transfer(
        &self,
        _from: &ChainAccount,
        to: &str,
        amount: Amount,
        fee: &FeeEstimate,
    ) -> Result<PreparedTransfer, ForwardError> {
        Ok(PreparedTransfer {
            to: to.to_string(),
            amount,
            fee: *fee,
            payload: json!("signed"),
        })
    }

    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<TransferResult, ForwardError> {
        {
            let mut balance = self.balance.lock().unwrap();
            let cost = prepared.amount + prepared.fee.fee;
            if cost > *balance {
                return Err(ForwardError::rejected(self.chain, "insufficient funds"));
            }
            *balance -= cost;
        }

        let mut submissions = self.submissions.lock().unwrap();
        submissions.push((prepared.to.clone(), prepared.amount));
        let tx_id = format!("tx-{}", submissions.len());

        if self.return_tx_id {
            Ok(classify_submission(
                json!({ "result": true, "txid": tx_id }),
                Some(tx_id),
            ))
        } else {
            Ok(classify_submission(json!({ "accepted": true }), None))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 记录型通知器
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct RecordingNotifier {
    pub outcomes: Mutex<Vec<(String, ForwardOutcome)>>,
    pub startups: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl RecordingNotifier {
    pub fn outcomes(&self) -> Vec<(String, ForwardOutcome)> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ForwardNotifier for RecordingNotifier {
    async fn notify_startup(&self, _wallets: &[ChainAccount]) {
        self.startups.fetch_add(1, Ordering::SeqCst);
    }

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

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 本地 mock 节点（axum）
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// mock 节点收到的请求
#[derive(Default)]
pub struct MockNode {
    pub requests: Mutex<Vec<Value>>,
    pub broadcasts: Mutex<Vec<Value>>,
    pub api_keys: Mutex<Vec<String>>,
    /// 余额（wei / sun）
    pub balance: Mutex<Amount>,
    /// 广播时是否返回交易 ID
    pub omit_tx_id: bool,
}

impl MockNode {
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance: Mutex::new(balance),
            ..Self::default()
        }
    }

    pub fn omitting_tx_id(balance: Amount) -> Self {
        Self {
            omit_tx_id: true,
            ..Self::with_balance(balance)
        }
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// 启动 EVM JSON-RPC mock，返回 RPC URL
pub async fn spawn_evm_node(node: Arc<MockNode>) -> String {
    let app = Router::new()
        .route("/", post(evm_rpc))
        .with_state(node);
    format!("http://{}", serve(app).await)
}

pub const MOCK_GAS_PRICE: u128 = 20_000_000_000;
pub const MOCK_CHAIN_ID: u64 = 31_337;
pub const MOCK_NONCE: u64 = 5;

async fn evm_rpc(State(node): State<Arc<MockNode>>, Json(request): Json<Value>) -> Json<Value> {
    node.requests.lock().unwrap().push(request.clone());
    let id = request.get("id").cloned().unwrap_or(json!(1));
    let method = request["method"].as_str().unwrap_or_default();

    let result = match method {
        "eth_getBalance" => json!(format!("0x{:x}", *node.balance.lock().unwrap())),
        "eth_gasPrice" => json!(format!("0x{:x}", MOCK_GAS_PRICE)),
        "eth_getTransactionCount" => json!(format!("0x{:x}", MOCK_NONCE)),
        "eth_chainId" => json!(format!("0x{:x}", MOCK_CHAIN_ID)),
        "eth_sendRawTransaction" => {
            let raw = request["params"][0].clone();
            node.broadcasts.lock().unwrap().push(raw.clone());
            if node.omit_tx_id {
                Value::Null
            } else {
                let bytes = hex::decode(raw.as_str().unwrap_or_default().trim_start_matches("0x"))
                    .unwrap_or_default();
                json!(format!("0x{}", hex::encode(mock_tx_hash(&bytes))))
            }
        }
        _ => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "method not found" }
            }))
        }
    };

    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

/// mock 只需要一个 32 字节的确定性哈希
fn mock_tx_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// 启动 TronGrid mock，返回 API 基础 URL
pub async fn spawn_tron_node(node: Arc<MockNode>) -> String {
    let app = Router::new()
        .route("/wallet/getaccount", post(tron_get_account))
        .route("/wallet/createtransaction", post(tron_create_transaction))
        .route("/wallet/broadcasttransaction", post(tron_broadcast))
        .with_state(node);
    format!("http://{}", serve(app).await)
}

fn record_tron(node: &MockNode, headers: &HeaderMap, request: &Value) {
    node.requests.lock().unwrap().push(request.clone());
    if let Some(key) = headers.get("TRON-PRO-API-KEY").and_then(|v| v.to_str().ok()) {
        node.api_keys.lock().unwrap().push(key.to_string());
    }
}

async fn tron_get_account(
    State(node): State<Arc<MockNode>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Json<Value> {
    record_tron(&node, &headers, &request);
    let balance = *node.balance.lock().unwrap();
    if balance == 0 {
        // 未激活账户
        return Json(json!({}));
    }
    Json(json!({ "address": request["address"], "balance": balance as u64 }))
}

async fn tron_create_transaction(
    State(node): State<Arc<MockNode>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Json<Value> {
    record_tron(&node, &headers, &request);
    // raw_data 用请求本身的字节代替 protobuf
    let raw_data = request.to_string().into_bytes();
    let tx_id = hex::encode(Sha256::digest(&raw_data));
    Json(json!({
        "visible": true,
        "txID": tx_id,
        "raw_data": {
            "contract": [{
                "parameter": { "value": request },
                "type": "TransferContract"
            }]
        },
        "raw_data_hex": hex::encode(raw_data)
    }))
}

async fn tron_broadcast(
    State(node): State<Arc<MockNode>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Json<Value> {
    record_tron(&node, &headers, &request);
    node.broadcasts.lock().unwrap().push(request.clone());

    if request["signature"].as_array().map_or(true, |s| s.is_empty()) {
        return Json(json!({
            "code": "SIGERROR",
            "message": hex::encode("Validate signature error: missing signature")
        }));
    }

    if node.omit_tx_id {
        Json(json!({ "result": true }))
    } else {
        Json(json!({ "result": true, "txid": request["txID"] }))
    }
}
