pub mod chain_client;
pub mod evm_client;
pub mod forward_executor;
pub mod notifier;
pub mod scheduler;
pub mod tron_client;

#[cfg(test)]
pub(crate) mod test_support;

pub use chain_client::{classify_submission, ChainClient, PreparedTransfer, TransferResult};
pub use evm_client::EvmClient;
pub use forward_executor::{ForwardExecutor, ForwardOutcome};
pub use notifier::{notifier_from_config, ForwardNotifier, NoopNotifier, TelegramNotifier};
pub use scheduler::{Scheduler, TickReport};
pub use tron_client::TronClient;
