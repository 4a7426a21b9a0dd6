//! Tron 链客户端（TronGrid HTTP API）
//!
//! 交易由节点构建（createtransaction），本地校验 txID 后签名再广播。
//! 所有地址使用 Base58（`visible: true`）。

use std::time::Duration;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::{
    config::TronForwardConfig,
    domain::chain::{Amount, ChainAccount, ChainKind, FeeEstimate},
    error::ForwardError,
    service::chain_client::{
        build_http_client, classify_submission, post_json, ChainClient, PreparedTransfer,
        TransferResult,
    },
};

const CHAIN: ChainKind = ChainKind::Tron;
const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

pub struct TronClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    /// 简单 TRX 转账的带宽费用（固定值）
    bandwidth_fee: Amount,
}

impl TronClient {
    pub fn new(config: &TronForwardConfig, timeout: Duration) -> Self {
        Self {
            http_client: build_http_client(timeout),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            bandwidth_fee: config.reserve_sun,
        }
    }

    async fn post(&self, path: &str, payload: Value) -> Result<Value, ForwardError> {
        let mut request = self.http_client.post(format!("{}{}", self.api_url, path));
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        tracing::debug!(path = path, "TronGrid request");
        post_json(CHAIN, request, &payload).await
    }
}

#[async_trait]
impl ChainClient for TronClient {
    fn chain(&self) -> ChainKind {
        CHAIN
    }

    async fn get_balance(&self, account: &ChainAccount) -> Result<Amount, ForwardError> {
        let response = self
            .post(
                "/wallet/getaccount",
                json!({ "address": account.address, "visible": true }),
            )
            .await?;
        parse_account_balance(&response)
    }

    async fn estimate_fee(&self) -> Result<FeeEstimate, ForwardError> {
        Ok(FeeEstimate::flat(self.bandwidth_fee))
    }

    async fn prepare_transfer(
        &self,
        from: &ChainAccount,
        to: &str,
        amount: Amount,
        fee: &FeeEstimate,
    ) -> Result<PreparedTransfer, ForwardError> {
        let sun = i64::try_from(amount).map_err(|_| {
            ForwardError::rejected(CHAIN, format!("amount {} exceeds the TRX transfer range", amount))
        })?;

        let unsigned = self
            .post(
                "/wallet/createtransaction",
                json!({
                    "owner_address": from.address,
                    "to_address": to,
                    "amount": sun,
                    "visible": true
                }),
            )
            .await?;

        let signed = sign_transaction(from.signing_key(), unsigned)?;

        tracing::debug!(
            from = %from.address,
            to = %to,
            tx_id = signed.get("txID").and_then(|v| v.as_str()).unwrap_or_default(),
            "Signed Tron transaction"
        );

        Ok(PreparedTransfer {
            to: to.to_string(),
            amount,
            fee: *fee,
            payload: signed,
        })
    }

    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<TransferResult, ForwardError> {
        let response = self
            .post("/wallet/broadcasttransaction", prepared.payload.clone())
            .await?;
        interpret_broadcast_response(response)
    }
}

/// 解析 getaccount 响应
///
/// 未激活账户返回 `{}`，已激活但余额为 0 的账户不带 balance 字段
pub fn parse_account_balance(response: &Value) -> Result<Amount, ForwardError> {
    let account = response.as_object().ok_or_else(|| {
        ForwardError::network(CHAIN, format!("getaccount returned a non-object: {}", response))
    })?;

    if let Some(error) = account.get("Error") {
        return Err(ForwardError::network(CHAIN, format!("getaccount error: {}", error)));
    }

    match account.get("balance") {
        None => Ok(0),
        Some(balance) => balance.as_u64().map(Amount::from).ok_or_else(|| {
            ForwardError::network(CHAIN, format!("getaccount returned an invalid balance: {}", balance))
        }),
    }
}

/// 校验节点构建的交易并签名
///
/// txID 必须等于 sha256(raw_data_hex)，否则签名的可能不是我们请求的交易
pub fn sign_transaction(signing_key: &SigningKey, mut tx: Value) -> Result<Value, ForwardError> {
    if let Some(error) = tx.get("Error").and_then(|e| e.as_str()) {
        return Err(ForwardError::rejected(CHAIN, error.to_string()));
    }

    let tx_id = tx
        .get("txID")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ForwardError::network(CHAIN, "createtransaction returned no txID"))?;
    let raw_data_hex = tx
        .get("raw_data_hex")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ForwardError::network(CHAIN, "createtransaction returned no raw_data_hex"))?;

    let raw_data = hex::decode(raw_data_hex)
        .map_err(|e| ForwardError::network(CHAIN, format!("invalid raw_data_hex: {}", e)))?;
    let digest = Sha256::digest(&raw_data);

    if !hex::encode(digest).eq_ignore_ascii_case(tx_id) {
        return Err(ForwardError::network(
            CHAIN,
            format!("txID {} does not match sha256(raw_data_hex)", tx_id),
        ));
    }

    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| ForwardError::network(CHAIN, format!("failed to sign transaction: {}", e)))?;

    // r || s || v，v = recid + 27
    let mut sig_bytes = signature.to_bytes().to_vec();
    sig_bytes.push(recovery_id.to_byte() + 27);

    if let Some(obj) = tx.as_object_mut() {
        obj.insert("signature".into(), json!([hex::encode(sig_bytes)]));
    }

    Ok(tx)
}

/// 解析 broadcasttransaction 响应
///
/// - `{"result": true, "txid": ...}`：成功
/// - 带 `code` 或 `result: false`：节点拒绝，`message` 为 hex 编码的原因
/// - 其他：接受但没有交易 ID
pub fn interpret_broadcast_response(response: Value) -> Result<TransferResult, ForwardError> {
    let accepted = response.get("result").and_then(|r| r.as_bool());
    let code = response.get("code").and_then(|c| c.as_str());

    if accepted == Some(false) || (accepted.is_none() && code.is_some()) {
        let message = response
            .get("message")
            .and_then(|m| m.as_str())
            .map(decode_message)
            .unwrap_or_default();
        return Err(ForwardError::rejected(
            CHAIN,
            format!("{}: {}", code.unwrap_or("FAILED"), message),
        ));
    }

    let tx_id = response
        .get("txid")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    if tx_id.is_none() {
        tracing::warn!(response = %response, "broadcasttransaction returned no txid");
    }

    Ok(classify_submission(response, tx_id))
}

/// TronGrid 的错误消息是 hex 编码的 UTF-8，解码失败时原样返回
fn decode_message(message: &str) -> String {
    hex::decode(message)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| message.to_string())
}
