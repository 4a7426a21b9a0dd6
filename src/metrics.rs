//! 进程内转发统计
//!
//! 每条链一组计数器，关闭时输出汇总；锁污染时继续使用内部数据

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

use crate::domain::chain::{Amount, ChainKind};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

/// 单条链的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainCounters {
    pub ticks: u64,
    pub forwarded: u64,
    pub skipped: u64,
    pub dry_run: u64,
    pub failed: u64,
    pub ambiguous: u64,
    /// 已确认提交的转发总额（最小单位）
    pub forwarded_amount: Amount,
    pub rpc_ok: u64,
    pub rpc_err: u64,
    pub rpc_latency_sum_ms: u128,
}

#[derive(Default)]
struct MetricsState {
    per_chain: HashMap<ChainKind, ChainCounters>,
    // 失败按错误类别统计（network / rejected / ...）
    failures_by_kind: HashMap<(ChainKind, &'static str), u64>,
}

fn state() -> MutexGuard<'static, MetricsState> {
    let lock = METRICS.get_or_init(|| Mutex::new(MetricsState::default()));
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

fn with_chain(chain: ChainKind, f: impl FnOnce(&mut ChainCounters)) {
    let mut s = state();
    f(s.per_chain.entry(chain).or_default());
}

pub fn count_tick(chain: ChainKind) {
    with_chain(chain, |c| c.ticks += 1);
}

pub fn count_forwarded(chain: ChainKind, amount: Amount) {
    with_chain(chain, |c| {
        c.forwarded += 1;
        c.forwarded_amount = c.forwarded_amount.saturating_add(amount);
    });
}

pub fn count_skipped(chain: ChainKind) {
    with_chain(chain, |c| c.skipped += 1);
}

pub fn count_dry_run(chain: ChainKind) {
    with_chain(chain, |c| c.dry_run += 1);
}

pub fn count_failed(chain: ChainKind, kind: &'static str) {
    let mut s = state();
    s.per_chain.entry(chain).or_default().failed += 1;
    *s.failures_by_kind.entry((chain, kind)).or_insert(0) += 1;
}

pub fn count_ambiguous(chain: ChainKind) {
    with_chain(chain, |c| c.ambiguous += 1);
}

/// 记录一次链上 RPC 调用
pub fn record_rpc(chain: ChainKind, ok: bool, latency_ms: u128) {
    with_chain(chain, |c| {
        if ok {
            c.rpc_ok += 1;
        } else {
            c.rpc_err += 1;
        }
        c.rpc_latency_sum_ms = c.rpc_latency_sum_ms.saturating_add(latency_ms);
    });
}

pub fn snapshot(chain: ChainKind) -> ChainCounters {
    state().per_chain.get(&chain).copied().unwrap_or_default()
}

pub fn failures_of_kind(chain: ChainKind, kind: &'static str) -> u64 {
    state()
        .failures_by_kind
        .get(&(chain, kind))
        .copied()
        .unwrap_or(0)
}

/// 单行汇总，用于关闭时的日志
pub fn render_summary() -> String {
    let s = state();
    let mut parts = Vec::new();
    for chain in ChainKind::ALL {
        let Some(c) = s.per_chain.get(&chain) else {
            continue;
        };
        let avg_latency = if c.rpc_ok + c.rpc_err == 0 {
            0
        } else {
            c.rpc_latency_sum_ms / u128::from(c.rpc_ok + c.rpc_err)
        };
        parts.push(format!(
            "{}: ticks={} forwarded={} ({} {}) skipped={} dry_run={} failed={} ambiguous={} rpc_ok={} rpc_err={} rpc_avg_ms={}",
            chain,
            c.ticks,
            c.forwarded,
            c.forwarded_amount,
            chain.unit(),
            c.skipped,
            c.dry_run,
            c.failed,
            c.ambiguous,
            c.rpc_ok,
            c.rpc_err,
            avg_latency
        ));
    }

    if parts.is_empty() {
        "no activity".to_string()
    } else {
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 计数器是进程全局的，其他测试可能并发写入，只断言增量下限

    #[test]
    fn test_forwarded_accumulates_amount() {
        let before = snapshot(ChainKind::Tron);
        count_forwarded(ChainKind::Tron, 1_000);
        count_forwarded(ChainKind::Tron, 2_500);
        let after = snapshot(ChainKind::Tron);

        assert!(after.forwarded >= before.forwarded + 2);
        assert!(after.forwarded_amount >= before.forwarded_amount + 3_500);
    }

    #[test]
    fn test_failures_are_grouped_by_kind() {
        let before = failures_of_kind(ChainKind::Evm, "network");
        count_failed(ChainKind::Evm, "network");
        assert!(failures_of_kind(ChainKind::Evm, "network") > before);
        assert!(snapshot(ChainKind::Evm).failed >= 1);
    }

    #[test]
    fn test_render_summary_mentions_active_chain() {
        count_tick(ChainKind::Evm);
        record_rpc(ChainKind::Evm, true, 12);
        let summary = render_summary();
        assert!(summary.contains("ETH: ticks="));
    }
}
