// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage wrapper that fails writes on demand.
//!
//! `FlakyStorage` delegates every call to an inner `StorageAdapter`. Writes
//! can be made to fail a fixed number of times, or until switched off, to
//! exercise retry and rollback paths. Reads always pass through.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use payrelay_core::types::{
    AdapterType, AgentCommission, ConnectedApp, Customer, HealthStatus, Offer, Transaction,
};
use payrelay_core::{PluginAdapter, RelayError, StorageAdapter};

pub struct FlakyStorage {
    inner: Arc<dyn StorageAdapter>,
    fail_next: AtomicUsize,
    failing: AtomicBool,
    failed_writes: AtomicUsize,
}

impl FlakyStorage {
    pub fn new(inner: Arc<dyn StorageAdapter>) -> Self {
        Self {
            inner,
            fail_next: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            failed_writes: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` writes, then pass through again.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every write until switched off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Writes refused so far.
    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::SeqCst)
    }

    fn write(&self) -> Result<(), RelayError> {
        let injected = self.failing.load(Ordering::SeqCst)
            || self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if injected {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Err(RelayError::Storage {
                source: Box::new(std::io::Error::other("injected storage failure")),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for FlakyStorage {
    fn name(&self) -> &str {
        "flaky-storage"
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl StorageAdapter for FlakyStorage {
    async fn initialize(&self) -> Result<(), RelayError> {
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.inner.close().await
    }

    async fn insert_offer(&self, offer: &Offer) -> Result<(), RelayError> {
        self.write()?;
        self.inner.insert_offer(offer).await
    }

    async fn update_offer(&self, offer: &Offer) -> Result<bool, RelayError> {
        self.write()?;
        self.inner.update_offer(offer).await
    }

    async fn delete_offer(&self, id: Uuid) -> Result<bool, RelayError> {
        self.write()?;
        self.inner.delete_offer(id).await
    }

    async fn list_offers(&self) -> Result<Vec<Offer>, RelayError> {
        self.inner.list_offers().await
    }

    async fn insert_transaction(&self, tx: &Transaction) -> Result<Uuid, RelayError> {
        self.write()?;
        self.inner.insert_transaction(tx).await
    }

    async fn insert_transaction_with_balance(
        &self,
        tx: &Transaction,
        balance_delta: i64,
    ) -> Result<Uuid, RelayError> {
        self.write()?;
        self.inner
            .insert_transaction_with_balance(tx, balance_delta)
            .await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, RelayError> {
        self.inner.get_transaction(id).await
    }

    async fn oldest_transaction(
        &self,
        skip_unmatched: bool,
    ) -> Result<Option<Transaction>, RelayError> {
        self.inner.oldest_transaction(skip_unmatched).await
    }

    async fn update_transaction(&self, tx: &Transaction) -> Result<bool, RelayError> {
        self.write()?;
        self.inner.update_transaction(tx).await
    }

    async fn update_transaction_with_balance(
        &self,
        tx: &Transaction,
        balance_delta: i64,
    ) -> Result<bool, RelayError> {
        self.write()?;
        self.inner
            .update_transaction_with_balance(tx, balance_delta)
            .await
    }

    async fn delete_transaction(&self, id: Uuid) -> Result<bool, RelayError> {
        self.write()?;
        self.inner.delete_transaction(id).await
    }

    async fn count_transactions(&self) -> Result<u64, RelayError> {
        self.inner.count_transactions().await
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, RelayError> {
        self.inner.list_transactions().await
    }

    async fn upsert_app(&self, app: &ConnectedApp) -> Result<(), RelayError> {
        self.write()?;
        self.inner.upsert_app(app).await
    }

    async fn delete_app(&self, connect_id: &str) -> Result<bool, RelayError> {
        self.write()?;
        self.inner.delete_app(connect_id).await
    }

    async fn list_apps(&self) -> Result<Vec<ConnectedApp>, RelayError> {
        self.inner.list_apps().await
    }

    async fn set_app_online(&self, connect_id: &str, online: bool) -> Result<bool, RelayError> {
        self.write()?;
        self.inner.set_app_online(connect_id, online).await
    }

    async fn set_all_apps_offline(&self) -> Result<(), RelayError> {
        self.write()?;
        self.inner.set_all_apps_offline().await
    }

    async fn increment_messages_sent(&self, connect_id: &str) -> Result<(), RelayError> {
        self.write()?;
        self.inner.increment_messages_sent(connect_id).await
    }

    async fn bind_app_offer(&self, connect_id: &str, offer_id: Uuid) -> Result<(), RelayError> {
        self.write()?;
        self.inner.bind_app_offer(connect_id, offer_id).await
    }

    async fn unbind_app_offer(&self, connect_id: &str, offer_id: Uuid) -> Result<bool, RelayError> {
        self.write()?;
        self.inner.unbind_app_offer(connect_id, offer_id).await
    }

    async fn list_app_offers(&self) -> Result<Vec<(String, Uuid)>, RelayError> {
        self.inner.list_app_offers().await
    }

    async fn get_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, RelayError> {
        self.inner.get_customer_by_phone(phone).await
    }

    async fn upsert_customer(&self, customer: &Customer) -> Result<Customer, RelayError> {
        self.write()?;
        self.inner.upsert_customer(customer).await
    }

    async fn adjust_customer_balance(&self, phone: &str, delta: i64) -> Result<bool, RelayError> {
        self.write()?;
        self.inner.adjust_customer_balance(phone, delta).await
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, RelayError> {
        self.inner.list_customers().await
    }

    async fn add_commission(&self, date: &str, amount: f64) -> Result<(), RelayError> {
        self.write()?;
        self.inner.add_commission(date, amount).await
    }

    async fn get_commission(&self, date: &str) -> Result<Option<AgentCommission>, RelayError> {
        self.inner.get_commission(date).await
    }

    async fn list_commissions(&self) -> Result<Vec<AgentCommission>, RelayError> {
        self.inner.list_commissions().await
    }
}
