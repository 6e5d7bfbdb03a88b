// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use payrelay_config::model::StorageConfig;
use payrelay_core::types::{AgentCommission, ConnectedApp, Customer, Offer, Transaction};
use payrelay_core::{AdapterType, HealthStatus, PluginAdapter, RelayError, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened by [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, RelayError> {
        self.db.get().ok_or_else(|| RelayError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), RelayError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| RelayError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Offers ---

    async fn insert_offer(&self, offer: &Offer) -> Result<(), RelayError> {
        queries::offers::insert_offer(self.db()?, offer).await
    }

    async fn update_offer(&self, offer: &Offer) -> Result<bool, RelayError> {
        queries::offers::update_offer(self.db()?, offer).await
    }

    async fn delete_offer(&self, id: Uuid) -> Result<bool, RelayError> {
        queries::offers::delete_offer(self.db()?, id).await
    }

    async fn list_offers(&self) -> Result<Vec<Offer>, RelayError> {
        queries::offers::list_offers(self.db()?).await
    }

    // --- Transactions ---

    async fn insert_transaction(&self, tx: &Transaction) -> Result<Uuid, RelayError> {
        queries::transactions::insert_transaction(self.db()?, tx).await
    }

    async fn insert_transaction_with_balance(
        &self,
        tx: &Transaction,
        balance_delta: i64,
    ) -> Result<Uuid, RelayError> {
        queries::transactions::insert_transaction_with_balance(self.db()?, tx, balance_delta).await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, RelayError> {
        queries::transactions::get_transaction(self.db()?, id).await
    }

    async fn oldest_transaction(
        &self,
        skip_unmatched: bool,
    ) -> Result<Option<Transaction>, RelayError> {
        queries::transactions::oldest_transaction(self.db()?, skip_unmatched).await
    }

    async fn update_transaction(&self, tx: &Transaction) -> Result<bool, RelayError> {
        queries::transactions::update_transaction(self.db()?, tx).await
    }

    async fn update_transaction_with_balance(
        &self,
        tx: &Transaction,
        balance_delta: i64,
    ) -> Result<bool, RelayError> {
        queries::transactions::update_transaction_with_balance(self.db()?, tx, balance_delta).await
    }

    async fn delete_transaction(&self, id: Uuid) -> Result<bool, RelayError> {
        queries::transactions::delete_transaction(self.db()?, id).await
    }

    async fn count_transactions(&self) -> Result<u64, RelayError> {
        queries::transactions::count_transactions(self.db()?).await
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, RelayError> {
        queries::transactions::list_transactions(self.db()?).await
    }

    // --- Connected apps ---

    async fn upsert_app(&self, app: &ConnectedApp) -> Result<(), RelayError> {
        queries::apps::upsert_app(self.db()?, app).await
    }

    async fn delete_app(&self, connect_id: &str) -> Result<bool, RelayError> {
        queries::apps::delete_app(self.db()?, connect_id).await
    }

    async fn list_apps(&self) -> Result<Vec<ConnectedApp>, RelayError> {
        queries::apps::list_apps(self.db()?).await
    }

    async fn set_app_online(&self, connect_id: &str, online: bool) -> Result<bool, RelayError> {
        queries::apps::set_app_online(self.db()?, connect_id, online).await
    }

    async fn set_all_apps_offline(&self) -> Result<(), RelayError> {
        queries::apps::set_all_apps_offline(self.db()?).await
    }

    async fn increment_messages_sent(&self, connect_id: &str) -> Result<(), RelayError> {
        queries::apps::increment_messages_sent(self.db()?, connect_id).await
    }

    async fn bind_app_offer(&self, connect_id: &str, offer_id: Uuid) -> Result<(), RelayError> {
        queries::apps::bind_app_offer(self.db()?, connect_id, offer_id).await
    }

    async fn unbind_app_offer(&self, connect_id: &str, offer_id: Uuid) -> Result<bool, RelayError> {
        queries::apps::unbind_app_offer(self.db()?, connect_id, offer_id).await
    }

    async fn list_app_offers(&self) -> Result<Vec<(String, Uuid)>, RelayError> {
        queries::apps::list_app_offers(self.db()?).await
    }

    // --- Customers ---

    async fn get_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, RelayError> {
        queries::customers::get_customer_by_phone(self.db()?, phone).await
    }

    async fn upsert_customer(&self, customer: &Customer) -> Result<Customer, RelayError> {
        queries::customers::upsert_customer(self.db()?, customer).await
    }

    async fn adjust_customer_balance(&self, phone: &str, delta: i64) -> Result<bool, RelayError> {
        queries::customers::adjust_customer_balance(self.db()?, phone, delta).await
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, RelayError> {
        queries::customers::list_customers(self.db()?).await
    }

    // --- Agent commission ---

    async fn add_commission(&self, date: &str, amount: f64) -> Result<(), RelayError> {
        queries::commissions::add_commission(self.db()?, date, amount).await
    }

    async fn get_commission(&self, date: &str) -> Result<Option<AgentCommission>, RelayError> {
        queries::commissions::get_commission(self.db()?, date).await
    }

    async fn list_commissions(&self) -> Result<Vec<AgentCommission>, RelayError> {
        queries::commissions::list_commissions(self.db()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists());
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let storage = SqliteStorage::new(make_config("never-opened.db"));
        assert!(storage.health_check().await.is_err());
        assert!(storage.list_offers().await.is_err());
    }

    #[tokio::test]
    async fn health_and_shutdown_after_writes() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.insert_offer(&Offer::new("1GB", "*1#", 99)).await.unwrap();
        storage.add_commission("2026-01-01", 1.0).await.unwrap();
        storage.shutdown().await.unwrap();
    }
}
