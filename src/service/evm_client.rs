//! EVM 链客户端（JSON-RPC）
//!
//! 余额、gasPrice、nonce 通过 JSON-RPC 查询，交易在本地用 ethers 签名后
//! 通过 eth_sendRawTransaction 广播

use std::time::Duration;

use async_trait::async_trait;
use ethers::{
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, TransactionRequest, U256},
};
use k256::ecdsa::SigningKey;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::{
    config::EvmForwardConfig,
    domain::chain::{Amount, ChainAccount, ChainKind, FeeEstimate},
    error::ForwardError,
    infrastructure::rpc_validator,
    service::chain_client::{
        build_http_client, classify_submission, post_json, ChainClient, PreparedTransfer,
        TransferResult,
    },
};

const CHAIN: ChainKind = ChainKind::Evm;

pub struct EvmClient {
    http_client: reqwest::Client,
    rpc_url: String,
    gas_limit: u64,
    chain_id: OnceCell<u64>,
}

impl EvmClient {
    pub fn new(config: &EvmForwardConfig, timeout: Duration) -> Self {
        Self {
            http_client: build_http_client(timeout),
            rpc_url: config.rpc_url.clone(),
            gas_limit: config.gas_limit,
            // 未配置时首次提交前查询并缓存
            chain_id: OnceCell::new_with(config.chain_id),
        }
    }

    /// 发送 JSON-RPC 请求，返回完整响应
    async fn rpc_raw(&self, method: &str, params: Value) -> Result<Value, ForwardError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        tracing::debug!(method = method, "EVM RPC request");
        post_json(CHAIN, self.http_client.post(&self.rpc_url), &payload).await
    }

    /// 发送 JSON-RPC 请求，返回 result 字段
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ForwardError> {
        let response = self.rpc_raw(method, params).await?;
        rpc_validator::validate_rpc_response(&response)
            .cloned()
            .map_err(|e| ForwardError::network(CHAIN, format!("{}: {:#}", method, e)))
    }

    async fn rpc_str(&self, method: &str, params: Value) -> Result<String, ForwardError> {
        match self.rpc(method, params).await? {
            Value::String(s) => Ok(s),
            other => Err(ForwardError::network(
                CHAIN,
                format!("{} returned a non-string result: {}", method, other),
            )),
        }
    }

    async fn gas_price(&self) -> Result<u128, ForwardError> {
        let hex = self.rpc_str("eth_gasPrice", json!([])).await?;
        rpc_validator::validate_gas_price(&hex).map_err(|e| invalid_response(&e))
    }

    async fn pending_nonce(&self, address: &str) -> Result<u64, ForwardError> {
        let hex = self
            .rpc_str("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        rpc_validator::validate_u64_quantity(&hex).map_err(|e| invalid_response(&e))
    }

    async fn chain_id(&self) -> Result<u64, ForwardError> {
        self.chain_id
            .get_or_try_init(|| async {
                let hex = self.rpc_str("eth_chainId", json!([])).await?;
                let id = rpc_validator::validate_u64_quantity(&hex)
                    .map_err(|e| invalid_response(&e))?;
                tracing::info!(chain_id = id, "EVM chain id resolved from RPC");
                Ok::<u64, ForwardError>(id)
            })
            .await
            .copied()
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    fn chain(&self) -> ChainKind {
        CHAIN
    }

    async fn get_balance(&self, account: &ChainAccount) -> Result<Amount, ForwardError> {
        let hex = self
            .rpc_str("eth_getBalance", json!([account.address, "latest"]))
            .await?;
        rpc_validator::validate_balance(&hex).map_err(|e| invalid_response(&e))
    }

    async fn estimate_fee(&self) -> Result<FeeEstimate, ForwardError> {
        let gas_price = self.gas_price().await?;
        Ok(FeeEstimate::from_gas(gas_price, self.gas_limit))
    }

    async fn prepare_transfer(
        &self,
        from: &ChainAccount,
        to: &str,
        amount: Amount,
        fee: &FeeEstimate,
    ) -> Result<PreparedTransfer, ForwardError> {
        // 必须使用与预留相同的 gasPrice，否则实际手续费可能超过预留
        let gas_price = match fee.gas_price {
            Some(price) => price,
            None => self.gas_price().await?,
        };
        let gas_limit = fee.gas_limit.unwrap_or(self.gas_limit);
        let nonce = self.pending_nonce(&from.address).await?;
        let chain_id = self.chain_id().await?;

        let raw_tx = sign_legacy_transfer(
            from.signing_key(),
            &LegacyTransfer {
                to,
                amount,
                gas_price,
                gas_limit,
                nonce,
                chain_id,
            },
        )?;

        tracing::debug!(
            from = %from.address,
            to = %to,
            nonce = nonce,
            chain_id = chain_id,
            "Signed EVM transaction"
        );

        Ok(PreparedTransfer {
            to: to.to_string(),
            amount,
            fee: *fee,
            payload: Value::String(raw_tx),
        })
    }

    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<TransferResult, ForwardError> {
        let response = self
            .rpc_raw("eth_sendRawTransaction", json!([prepared.payload]))
            .await?;
        interpret_send_response(response)
    }
}

fn invalid_response(err: &anyhow::Error) -> ForwardError {
    ForwardError::network(CHAIN, format!("invalid RPC response: {:#}", err))
}

/// 待签名的简单转账参数
#[derive(Debug, Clone, Copy)]
pub struct LegacyTransfer<'a> {
    pub to: &'a str,
    pub amount: Amount,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub nonce: u64,
    pub chain_id: u64,
}

/// 构建并签名 EIP-155 legacy 交易，返回 0x 前缀的 RLP hex
pub fn sign_legacy_transfer(
    signing_key: &SigningKey,
    transfer: &LegacyTransfer<'_>,
) -> Result<String, ForwardError> {
    let to: Address = transfer
        .to
        .parse()
        .map_err(|_| ForwardError::config(format!("invalid EVM destination: {}", transfer.to)))?;

    let wallet = LocalWallet::from_bytes(signing_key.to_bytes().as_slice())
        .map_err(|e| ForwardError::config(format!("invalid EVM signing key: {}", e)))?
        .with_chain_id(transfer.chain_id);

    let tx = TypedTransaction::Legacy(
        TransactionRequest::new()
            .from(wallet.address())
            .to(to)
            .value(U256::from(transfer.amount))
            .gas(transfer.gas_limit)
            .gas_price(U256::from(transfer.gas_price))
            .nonce(transfer.nonce)
            .chain_id(transfer.chain_id),
    );

    let signature = wallet
        .sign_transaction_sync(&tx)
        .map_err(|e| ForwardError::network(CHAIN, format!("failed to sign transaction: {}", e)))?;

    Ok(format!("0x{}", hex::encode(tx.rlp_signed(&signature))))
}

/// 解析 eth_sendRawTransaction 响应
///
/// - JSON-RPC error：节点拒绝（nonce 过低、余额不足等）
/// - result 为合法交易哈希：成功
/// - 其余情况：节点接受但没有可用的交易 ID
pub fn interpret_send_response(response: Value) -> Result<TransferResult, ForwardError> {
    if let Some(error) = response.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown RPC error");
        return Err(ForwardError::rejected(
            CHAIN,
            format!("RPC error {}: {}", code, message),
        ));
    }

    let tx_hash = response
        .get("result")
        .and_then(|r| r.as_str())
        .and_then(|hash| rpc_validator::validate_tx_hash(hash).ok());

    if tx_hash.is_none() {
        tracing::warn!(
            response = %response,
            "eth_sendRawTransaction returned no valid transaction hash"
        );
    }

    Ok(classify_submission(response, tx_hash))
}
