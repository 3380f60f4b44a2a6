use common::configuration::{ConfigError, Configuration, StorageType};
use common::pricing::PricingTable;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::auth::Authenticator;
use crate::dispatcher::Dispatcher;
use crate::ledger::file::FileLedger;
use crate::ledger::memory::MemoryLedger;
use crate::ledger::{LedgerError, UsageLedger};
use crate::usage::UsageRecorder;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load pricing table: {0}")]
    Pricing(#[from] serde_yaml::Error),

    #[error("failed to open usage ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Shared state handed to every request.
pub struct AppContext {
    pub dispatcher: Dispatcher,
    pub ledger: Arc<dyn UsageLedger>,
    pub recorder: Arc<UsageRecorder>,
    pub authenticator: Authenticator,
    pub max_request_bytes: usize,
}

impl AppContext {
    pub fn new(
        dispatcher: Dispatcher,
        ledger: Arc<dyn UsageLedger>,
        pricing: PricingTable,
        authenticator: Authenticator,
        max_request_bytes: usize,
    ) -> Self {
        let recorder = Arc::new(UsageRecorder::new(Arc::clone(&ledger), Arc::new(pricing)));
        Self {
            dispatcher,
            ledger,
            recorder,
            authenticator,
            max_request_bytes,
        }
    }

    pub async fn from_config(config: &Configuration) -> Result<Self, StartupError> {
        let pricing = PricingTable::builtin()?.with_overrides(config.pricing.as_ref());
        let dispatcher = Dispatcher::new(config.resolved_providers()?, &config.upstream)?;

        let ledger: Arc<dyn UsageLedger> = match config.storage.storage_type {
            StorageType::File => {
                info!(
                    storage_type = "file",
                    directory = %config.storage.directory.display(),
                    "initialized usage ledger"
                );
                Arc::new(FileLedger::open(config.storage.directory.clone()).await?)
            }
            StorageType::Memory => {
                info!(storage_type = "memory", "initialized usage ledger");
                Arc::new(MemoryLedger::new())
            }
        };

        if !config.access_tokens.is_empty() {
            info!(tokens = config.access_tokens.len(), "bearer token authentication enabled");
        }

        Ok(Self::new(
            dispatcher,
            ledger,
            pricing,
            Authenticator::new(config.access_tokens.clone()),
            config.upstream.max_request_bytes,
        ))
    }
}
