//! 定时调度
//!
//! 固定间隔唤醒，每个钱包一个独立任务；单个任务出错或 panic 不影响其他任务和后续轮次

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};

use crate::{
    metrics,
    service::{
        forward_executor::{ForwardExecutor, ForwardOutcome},
        notifier::ForwardNotifier,
    },
};

/// 单个钱包在一轮中的结果；任务 panic 时 `outcome` 为 None
#[derive(Debug, Clone)]
pub struct TickReport {
    pub wallet: String,
    pub outcome: Option<ForwardOutcome>,
}

pub struct Scheduler {
    executors: Vec<Arc<ForwardExecutor>>,
    interval: Duration,
    notifier: Arc<dyn ForwardNotifier>,
}

impl Scheduler {
    pub fn new(
        executors: Vec<ForwardExecutor>,
        interval: Duration,
        notifier: Arc<dyn ForwardNotifier>,
    ) -> Self {
        Self {
            executors: executors.into_iter().map(Arc::new).collect(),
            interval,
            notifier,
        }
    }

    pub fn executors(&self) -> &[Arc<ForwardExecutor>] {
        &self.executors
    }

    /// 执行一轮：所有钱包并发运行，等待全部结束
    pub async fn tick(&self) -> Vec<TickReport> {
        let handles = self.executors.iter().map(|executor| {
            let executor = Arc::clone(executor);
            tokio::spawn(async move { executor.run_once().await })
        });
        let results = join_all(handles).await;

        self.executors
            .iter()
            .zip(results)
            .map(|(executor, result)| {
                let wallet = executor.account().label();
                let outcome = match result {
                    Ok(outcome) => Some(outcome),
                    Err(join_err) => {
                        tracing::error!(
                            wallet = %wallet,
                            error = %join_err,
                            "❌ Forward task aborted, continuing with other wallets"
                        );
                        None
                    }
                };
                TickReport { wallet, outcome }
            })
            .collect()
    }

    /// 运行直到收到关闭信号
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            wallets = self.executors.len(),
            interval_ms = self.interval.as_millis() as u64,
            "🚀 Forwarding loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let reports = self.tick().await;
                    let forwarded = reports
                        .iter()
                        .filter(|r| r.outcome.as_ref().is_some_and(ForwardOutcome::is_forwarded))
                        .count();
                    tracing::debug!(wallets = reports.len(), forwarded = forwarded, "Tick finished");
                }
                changed = shutdown.changed() => {
                    // 发送端被丢弃同样视为关闭
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.notifier.notify_shutdown().await;
        tracing::info!(summary = %metrics::render_summary(), "🛑 Forwarding loop stopped");
    }
}
