// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening the durable store and the components that sit on it.

use std::sync::Arc;

use payrelay_config::model::PayrelayConfig;
use payrelay_core::{RelayError, StorageAdapter};
use payrelay_relay::{AppRegistry, OfferCatalog, TransactionQueue};
use payrelay_storage::SqliteStorage;

/// Open and migrate the configured database.
pub async fn open_storage(config: &PayrelayConfig) -> Result<Arc<dyn StorageAdapter>, RelayError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

/// Components shared by the one-shot commands.
pub struct Stack {
    pub storage: Arc<dyn StorageAdapter>,
    pub catalog: Arc<OfferCatalog>,
    pub queue: Arc<TransactionQueue>,
    pub registry: Arc<AppRegistry>,
}

impl Stack {
    pub async fn open(config: &PayrelayConfig) -> Result<Self, RelayError> {
        let storage = open_storage(config).await?;
        let catalog = Arc::new(OfferCatalog::load(storage.clone()).await?);
        let queue = Arc::new(
            TransactionQueue::new(storage.clone(), &config.dispatch, &config.policy).await?,
        );
        let registry = Arc::new(AppRegistry::load(storage.clone()).await?);
        Ok(Self {
            storage,
            catalog,
            queue,
            registry,
        })
    }

    pub async fn close(self) -> Result<(), RelayError> {
        self.storage.close().await
    }
}
