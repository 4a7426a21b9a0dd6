//! 链客户端抽象
//!
//! 每条链实现同一个异步接口：查余额、查手续费、提交转账。
//! 提交分两步：`prepare_transfer` 构建并签名（不广播），`broadcast` 发出已签名交易。
//! 交易是否成功只由 `classify_submission` 决定。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    domain::chain::{Amount, ChainAccount, ChainKind, FeeEstimate},
    error::ForwardError,
};

/// 转账提交结果
///
/// `tx_id` 有值当且仅当 `success == true`
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult {
    pub success: bool,
    pub tx_id: Option<String>,
    /// 节点原始响应（用于排查）
    pub raw_response: Value,
}

/// 已签名、尚未广播的转账
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTransfer {
    pub to: String,
    pub amount: Amount,
    pub fee: FeeEstimate,
    /// 链相关的已签名载荷（EVM 为 RLP hex，Tron 为签名后的交易 JSON）
    pub payload: Value,
}

/// 判定提交结果：有非空交易 ID 才算成功，无论响应中其他字段如何
pub fn classify_submission(raw_response: Value, tx_id: Option<String>) -> TransferResult {
    let tx_id = tx_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    TransferResult {
        success: tx_id.is_some(),
        tx_id,
        raw_response,
    }
}

/// 链客户端接口
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain(&self) -> ChainKind;

    /// 查询当前可用余额（最小单位），不做内部重试
    async fn get_balance(&self, account: &ChainAccount) -> Result<Amount, ForwardError>;

    /// 查询一次简单转账的手续费
    async fn estimate_fee(&self) -> Result<FeeEstimate, ForwardError>;

    /// 构建并签名转账，不向网络发送任何交易
    async fn prepare_transfer(
        &self,
        from: &ChainAccount,
        to: &str,
        amount: Amount,
        fee: &FeeEstimate,
    ) -> Result<PreparedTransfer, ForwardError>;

    /// 广播已签名的转账
    ///
    /// 节点明确拒绝返回 `SubmissionRejected`；接受但没有交易 ID 返回 `success: false`
    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<TransferResult, ForwardError>;

    /// 签名并广播转账
    async fn submit_transfer(
        &self,
        from: &ChainAccount,
        to: &str,
        amount: Amount,
        fee: &FeeEstimate,
    ) -> Result<TransferResult, ForwardError> {
        let prepared = self.prepare_transfer(from, to, amount, fee).await?;
        self.broadcast(&prepared).await
    }
}

/// 构建带超时的 HTTP 客户端
pub(crate) fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// POST JSON 并解析响应体，记录 RPC 指标
pub(crate) async fn post_json(
    chain: ChainKind,
    request: reqwest::RequestBuilder,
    payload: &Value,
) -> Result<Value, ForwardError> {
    let started = Instant::now();
    let result = send_json(chain, request, payload).await;
    crate::metrics::record_rpc(chain, result.is_ok(), started.elapsed().as_millis());
    result
}

async fn send_json(
    chain: ChainKind,
    request: reqwest::RequestBuilder,
    payload: &Value,
) -> Result<Value, ForwardError> {
    let response = request
        .header("Content-Type", "application/json")
        .json(payload)
        .send()
        .await
        .map_err(|e| ForwardError::network(chain, format!("request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ForwardError::network(chain, format!("failed to read response body: {}", e)))?;

    if !status.is_success() {
        return Err(ForwardError::network(
            chain,
            format!("request failed with status {}: {}", status, body),
        ));
    }

    serde_json::from_str(&body)
        .map_err(|e| ForwardError::network(chain, format!("invalid JSON response: {}", e)))
}
