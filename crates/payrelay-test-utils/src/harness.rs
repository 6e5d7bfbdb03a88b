// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the whole forwarding stack on a temp SQLite
//! database with a [`MockTransport`] in place of the socket. Tests feed SMS
//! text in with `ingest()` and drive delivery with `drain()`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use payrelay_config::model::{DispatchConfig, PayrelayConfig, PolicyConfig, SmsConfig, StorageConfig};
use payrelay_core::types::{ConnectedApp, Offer, RawSmsMessage};
use payrelay_core::{RelayError, SocketTransport, StorageAdapter, now_millis};
use payrelay_relay::{
    AppRegistry, CycleEnd, Dispatcher, OfferCatalog, ProcessOutcome, SmsProcessor,
    TransactionQueue,
};
use payrelay_storage::SqliteStorage;

use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: PayrelayConfig,
    offers: Vec<Offer>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = PayrelayConfig::default();
        config.dispatch.stall_backoff_ms = 10;
        config.dispatch.retry_backoff_ms = 10;
        Self {
            config,
            offers: Vec::new(),
        }
    }

    pub fn with_sms(mut self, sms: SmsConfig) -> Self {
        self.config.sms = sms;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.config.dispatch = dispatch;
        self
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.config.policy = policy;
        self
    }

    /// Seed the catalog before the harness is built.
    pub fn with_offer(mut self, offer: Offer) -> Self {
        self.offers.push(offer);
        self
    }

    pub async fn build(self) -> Result<TestHarness, RelayError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RelayError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        });
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        for offer in &self.offers {
            storage.insert_offer(offer).await?;
        }

        let catalog = Arc::new(OfferCatalog::load(storage.clone()).await?);
        let queue = Arc::new(
            TransactionQueue::new(storage.clone(), &self.config.dispatch, &self.config.policy)
                .await?,
        );
        let registry = Arc::new(AppRegistry::load(storage.clone()).await?);
        let transport = Arc::new(MockTransport::new());
        let processor = Arc::new(SmsProcessor::new(
            &self.config.sms,
            &self.config.dispatch,
            catalog.clone(),
            queue.clone(),
            storage.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            queue.clone(),
            registry.clone(),
            transport.clone() as Arc<dyn SocketTransport>,
            storage.clone(),
            &self.config.dispatch,
            &self.config.policy,
        ));

        Ok(TestHarness {
            storage,
            catalog,
            queue,
            registry,
            processor,
            dispatcher,
            transport,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete forwarding stack with a mock transport and temp storage.
pub struct TestHarness {
    pub storage: Arc<dyn StorageAdapter>,
    pub catalog: Arc<OfferCatalog>,
    pub queue: Arc<TransactionQueue>,
    pub registry: Arc<AppRegistry>,
    pub processor: Arc<SmsProcessor>,
    pub dispatcher: Arc<Dispatcher>,
    pub transport: Arc<MockTransport>,
    pub config: PayrelayConfig,
    /// Keeps the database directory alive for the harness lifetime.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Run one complete text message through the pipeline.
    pub async fn ingest(&self, sender: &str, text: &str) -> ProcessOutcome {
        let raw = RawSmsMessage {
            message: text.to_string(),
            sender: sender.to_string(),
            sim_slot: None,
            timestamp: now_millis(),
        };
        self.processor.process_message(&raw).await
    }

    /// Register an app that is online right away.
    pub async fn connect_app(&self, connect_id: &str) -> Result<(), RelayError> {
        let mut app = ConnectedApp::new(connect_id, connect_id);
        app.is_online = true;
        self.registry.register(app).await
    }

    /// Run a single dispatch cycle to completion.
    pub async fn drain(&self) -> CycleEnd {
        self.dispatcher.run_cycle(&CancellationToken::new()).await
    }
}
