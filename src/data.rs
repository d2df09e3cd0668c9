use std::{ops::Deref, sync::Arc};

use crate::config::BotConfig;
use crate::duty::DutyService;
use crate::error::CoreResult;
use crate::leaderboard::Leaderboard;
use crate::ledger::WarningLedger;
use crate::store::{RecordStore, YamlStore};

/// Shared state handed to every command
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

/// Services wired over a single record store
pub struct DataInner {
    pub config: BotConfig,
    pub duty: DutyService,
    pub ledger: WarningLedger,
    pub leaderboard: Leaderboard,
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Open the YAML store under `config.data_dir` and build the services over it
    ///
    /// # Errors
    /// Returns an error if the store cannot be opened or the ledger cannot read it
    pub async fn open(config: BotConfig) -> CoreResult<Self> {
        let store = YamlStore::open(&config.data_dir).await?;
        Self::with_store(config, Arc::new(store)).await
    }

    /// Build the services over an existing store
    ///
    /// # Errors
    /// Returns an error if the ledger cannot read its id sequence or existing warnings
    pub async fn with_store(config: BotConfig, store: Arc<dyn RecordStore>) -> CoreResult<Self> {
        let ledger = WarningLedger::open(Arc::clone(&store)).await?;
        let leaderboard =
            Leaderboard::with_default_limit(Arc::clone(&store), config.leaderboard_size);
        let duty = DutyService::new(store);

        Ok(Self(Arc::new(DataInner {
            config,
            duty,
            ledger,
            leaderboard,
        })))
    }
}
