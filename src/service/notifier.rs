//! 转发结果通知
//!
//! 通知失败只记录 warn，不影响转发流程

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use crate::{
    config::TelegramConfig,
    domain::chain::ChainAccount,
    service::forward_executor::ForwardOutcome,
    utils::amount_format::format_amount,
};

const TELEGRAM_HTTP_TIMEOUT_SECS: u64 = 5;
const TELEGRAM_API_BASE: &str = "https://api.telegram.org/bot";

#[async_trait]
pub trait ForwardNotifier: Send + Sync {
    async fn notify_startup(&self, _wallets: &[ChainAccount]) {}

    async fn notify_shutdown(&self) {}

    /// 单次转发尝试的结果（跳过不通知）
    async fn notify_outcome(
        &self,
        _account: &ChainAccount,
        _destination: &str,
        _outcome: &ForwardOutcome,
    ) {
    }
}

pub struct NoopNotifier;

#[async_trait]
impl ForwardNotifier for NoopNotifier {}

pub fn noop_notifier() -> Arc<dyn ForwardNotifier> {
    Arc::new(NoopNotifier)
}

pub struct TelegramNotifier {
    chat_id: String,
    endpoint: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl AsRef<str>, chat_id: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(TELEGRAM_HTTP_TIMEOUT_SECS);
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|err| {
            warn!(
                "Failed to build Telegram reqwest client with timeout ({}); using default client",
                err
            );
            Client::new()
        });

        Self {
            chat_id: chat_id.into(),
            endpoint: format!("{TELEGRAM_API_BASE}{}/sendMessage", bot_token.as_ref()),
            client,
        }
    }

    async fn send_message(&self, text: &str) -> Result<(), String> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": true
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| format!("request error: {err}"))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(format!("telegram API returned {status}: {body}"))
    }
}

/// 渲染结果消息；跳过返回 None
pub fn render_outcome_message(
    account: &ChainAccount,
    destination: &str,
    outcome: &ForwardOutcome,
) -> Option<String> {
    let chain = account.chain;
    let wallet = escape_markdown_v2(&account.address);
    let destination = escape_markdown_v2(destination);
    let symbol = chain.symbol();

    let body = match outcome {
        ForwardOutcome::Skipped(_) => return None,
        ForwardOutcome::Forwarded { tx_id, amount } => format!(
            "🟢 *{symbol} forwarded*\n\n💸 *Amount:* {}\n👛 *From:* `{wallet}`\n🎯 *To:* `{destination}`\n🆔 *Tx:* `{}`",
            escape_markdown_v2(&format_amount(chain, *amount)),
            escape_markdown_v2(tx_id),
        ),
        ForwardOutcome::DryRun { amount } => format!(
            "🧪 *{symbol} dry run*\n\n💸 *Would forward:* {}\n👛 *From:* `{wallet}`\n🎯 *To:* `{destination}`",
            escape_markdown_v2(&format_amount(chain, *amount)),
        ),
        ForwardOutcome::Ambiguous { amount, raw } => format!(
            "⚠️ *{symbol} submission ambiguous*\n\nNode accepted the transfer of {} but returned no transaction id\\. Check the wallet manually\\.\n👛 *From:* `{wallet}`\n📄 *Response:* `{}`",
            escape_markdown_v2(&format_amount(chain, *amount)),
            escape_markdown_v2(&raw.to_string()),
        ),
        ForwardOutcome::Failed { kind, message } => format!(
            "❌ *{symbol} forward failed*\n\n📌 *Kind:* {}\n👛 *From:* `{wallet}`\n📝 {}",
            escape_markdown_v2(kind),
            escape_markdown_v2(message),
        ),
    };

    Some(body)
}

pub fn escape_markdown_v2(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' | '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
            | '|' | '{' | '}' | '.' | '!' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

#[async_trait]
impl ForwardNotifier for TelegramNotifier {
    async fn notify_startup(&self, wallets: &[ChainAccount]) {
        let started_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let mut message = format!(
            "🚀 *Wallet forwarder started*\n🕒 {}\n",
            escape_markdown_v2(&started_at)
        );
        for wallet in wallets {
            message.push_str(&format!(
                "\n• {}: `{}`",
                escape_markdown_v2(&wallet.label()),
                escape_markdown_v2(&wallet.address)
            ));
        }
        if let Err(err) = self.send_message(&message).await {
            warn!("Failed Telegram startup notification: {}", err);
        }
    }

    async fn notify_shutdown(&self) {
        let message = "🛑 Wallet forwarder is shutting down\\.";
        if let Err(err) = self.send_message(message).await {
            warn!("Failed Telegram shutdown notification: {}", err);
        }
    }

    async fn notify_outcome(
        &self,
        account: &ChainAccount,
        destination: &str,
        outcome: &ForwardOutcome,
    ) {
        let Some(message) = render_outcome_message(account, destination, outcome) else {
            return;
        };

        if let Err(err) = self.send_message(&message).await {
            warn!(wallet = %account.label(), "Failed Telegram outcome notification: {}", err);
        }
    }
}

/// 根据配置选择通知器（未配置 Telegram 时不发送任何通知）
pub fn notifier_from_config(config: Option<&TelegramConfig>) -> Arc<dyn ForwardNotifier> {
    match config {
        Some(telegram) => Arc::new(TelegramNotifier::new(
            &telegram.bot_token,
            telegram.chat_id.clone(),
        )),
        None => noop_notifier(),
    }
}
