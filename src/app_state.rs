use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    config::ForwarderConfig,
    domain::{
        chain::{ChainAccount, ChainKind},
        derivation::derive_account,
        forward_policy::ForwardPolicy,
    },
    service::{
        chain_client::ChainClient,
        evm_client::EvmClient,
        forward_executor::ForwardExecutor,
        notifier::{notifier_from_config, ForwardNotifier},
        scheduler::Scheduler,
        tron_client::TronClient,
    },
};

/// 应用状态
/// 启动时一次性构建，之后只读
pub struct AppState {
    pub config: Arc<ForwarderConfig>,
    pub notifier: Arc<dyn ForwardNotifier>,
    /// 所有被归集的钱包（链 × 地址索引）
    pub accounts: Vec<ChainAccount>,
    pub scheduler: Scheduler,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: ForwarderConfig) -> Result<Self> {
        let notifier = notifier_from_config(config.telegram.as_ref());
        Self::with_notifier(config, notifier)
    }

    pub fn with_notifier(
        config: ForwarderConfig,
        notifier: Arc<dyn ForwardNotifier>,
    ) -> Result<Self> {
        config.validate()?;

        let timeout = config.scheduler.rpc_timeout();
        let mut executors = Vec::new();

        if let Some(evm) = &config.evm {
            let client: Arc<dyn ChainClient> = Arc::new(EvmClient::new(evm, timeout));
            executors.extend(build_executors(
                &config,
                client,
                &evm.destination,
                evm.policy()?,
                &notifier,
            )?);
        }

        if let Some(tron) = &config.tron {
            let client: Arc<dyn ChainClient> = Arc::new(TronClient::new(tron, timeout));
            executors.extend(build_executors(
                &config,
                client,
                &tron.destination,
                tron.policy()?,
                &notifier,
            )?);
        }

        let accounts = executors.iter().map(|e| e.account().clone()).collect();
        let scheduler = Scheduler::new(
            executors,
            config.scheduler.poll_interval(),
            notifier.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            notifier,
            accounts,
            scheduler,
        })
    }
}

/// 为一条链的每个地址索引派生钱包并创建执行器
fn build_executors(
    config: &ForwarderConfig,
    client: Arc<dyn ChainClient>,
    destination: &str,
    policy: ForwardPolicy,
    notifier: &Arc<dyn ForwardNotifier>,
) -> Result<Vec<ForwardExecutor>> {
    let chain: ChainKind = client.chain();

    config
        .wallet_indices
        .iter()
        .map(|&index| -> Result<ForwardExecutor> {
            let account = derive_account(config.seed_phrase.expose(), chain, index)?;
            let executor = ForwardExecutor::new(
                account,
                destination,
                client.clone(),
                policy,
                notifier.clone(),
            )
            .with_context(|| format!("Failed to set up {} wallet #{}", chain, index))?
            .with_call_timeout(config.scheduler.rpc_timeout())
            .with_dry_run(config.scheduler.dry_run);
            Ok(executor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{
            EvmForwardConfig, LoggingConfig, SchedulerConfig, SecretPhrase, TronForwardConfig,
            DEFAULT_EVM_GAS_LIMIT, DEFAULT_TRON_API_URL,
        },
        error::ForwardError,
        service::notifier::noop_notifier,
    };

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn config(evm_destination: &str) -> ForwarderConfig {
        ForwarderConfig {
            seed_phrase: SecretPhrase::new(MNEMONIC),
            wallet_indices: vec![0, 1],
            evm: Some(EvmForwardConfig {
                rpc_url: "http://127.0.0.1:8545".into(),
                destination: evm_destination.into(),
                min_threshold_wei: 0,
                fee_margin_wei: 0,
                gas_limit: DEFAULT_EVM_GAS_LIMIT,
                chain_id: Some(31337),
            }),
            tron: Some(TronForwardConfig {
                api_url: DEFAULT_TRON_API_URL.into(),
                api_key: None,
                destination: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
                min_threshold_sun: 100_000,
                reserve_sun: 50_000,
            }),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig {
                level: "info".into(),
                format: "text".into(),
            },
            telegram: None,
        }
    }

    #[test]
    fn test_one_executor_per_chain_and_index() {
        let state = AppState::with_notifier(
            config("0x742d35cc6634c0532925a3b844bc9e7595f0beb6"),
            noop_notifier(),
        )
        .unwrap();

        assert_eq!(state.accounts.len(), 4);
        assert_eq!(state.scheduler.executors().len(), 4);

        let labels: Vec<String> = state.accounts.iter().map(|a| a.label()).collect();
        assert_eq!(labels, vec!["ETH#0", "ETH#1", "TRX#0", "TRX#1"]);
        assert_eq!(
            state.accounts[0].address,
            "0x9858effd232b4033e47d90003d41ec34ecaeda94"
        );
    }

    #[test]
    fn test_destination_equal_to_swept_wallet_is_fatal() {
        // 索引 0 的 EVM 钱包地址
        let result = AppState::with_notifier(
            config("0x9858EfFD232B4033E47d90003D41EC34EcaEda94"),
            noop_notifier(),
        );
        let err = match result {
            Ok(_) => panic!("expected a configuration error"),
            Err(err) => err,
        };
        let is_config_error = err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<ForwardError>(),
                Some(ForwardError::Configuration(_))
            )
        });
        assert!(is_config_error);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_derivation() {
        let mut cfg = config("0x742d35cc6634c0532925a3b844bc9e7595f0beb6");
        cfg.seed_phrase = SecretPhrase::new("");
        assert!(AppState::with_notifier(cfg, noop_notifier()).is_err());
    }
}
