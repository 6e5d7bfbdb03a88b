// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the durable relational store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AgentCommission, ConnectedApp, Customer, Offer, Transaction,
};

/// Adapter for the durable store behind offers, transactions, connected apps,
/// customers and commissions.
///
/// The transaction table is the single authoritative record of undelivered
/// work: the dispatcher re-reads it on every delivery attempt.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), RelayError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), RelayError>;

    // --- Offers ---

    async fn insert_offer(&self, offer: &Offer) -> Result<(), RelayError>;

    /// Returns `false` when no offer with that id exists.
    async fn update_offer(&self, offer: &Offer) -> Result<bool, RelayError>;

    /// Returns `false` when no offer with that id exists.
    async fn delete_offer(&self, id: Uuid) -> Result<bool, RelayError>;

    async fn list_offers(&self) -> Result<Vec<Offer>, RelayError>;

    // --- Transactions ---

    /// Persists a transaction and returns its identifier.
    async fn insert_transaction(&self, tx: &Transaction) -> Result<Uuid, RelayError>;

    /// Persists a transaction and adds `balance_delta` to the balance of
    /// `tx.customer` in one atomic write.
    async fn insert_transaction_with_balance(
        &self,
        tx: &Transaction,
        balance_delta: i64,
    ) -> Result<Uuid, RelayError>;

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, RelayError>;

    /// The transaction with the minimum `time`, ties broken by insertion order.
    ///
    /// With `skip_unmatched`, transactions in `UNMATCHED` status are ignored.
    async fn oldest_transaction(
        &self,
        skip_unmatched: bool,
    ) -> Result<Option<Transaction>, RelayError>;

    /// Overwrites the mutable fields (status, time, retries, offer, response,
    /// reschedule info) of an existing transaction. Returns `false` if absent.
    async fn update_transaction(&self, tx: &Transaction) -> Result<bool, RelayError>;

    /// Like [`update_transaction`](Self::update_transaction), also adding
    /// `balance_delta` to the balance of `tx.customer` in the same commit.
    async fn update_transaction_with_balance(
        &self,
        tx: &Transaction,
        balance_delta: i64,
    ) -> Result<bool, RelayError>;

    /// Removes a transaction. Returns `false` if it was already gone.
    async fn delete_transaction(&self, id: Uuid) -> Result<bool, RelayError>;

    async fn count_transactions(&self) -> Result<u64, RelayError>;

    /// All transactions, oldest first.
    async fn list_transactions(&self) -> Result<Vec<Transaction>, RelayError>;

    // --- Connected apps ---

    async fn upsert_app(&self, app: &ConnectedApp) -> Result<(), RelayError>;

    async fn delete_app(&self, connect_id: &str) -> Result<bool, RelayError>;

    async fn list_apps(&self) -> Result<Vec<ConnectedApp>, RelayError>;

    async fn set_app_online(&self, connect_id: &str, online: bool) -> Result<bool, RelayError>;

    async fn set_all_apps_offline(&self) -> Result<(), RelayError>;

    async fn increment_messages_sent(&self, connect_id: &str) -> Result<(), RelayError>;

    // --- App/offer bindings ---

    async fn bind_app_offer(&self, connect_id: &str, offer_id: Uuid) -> Result<(), RelayError>;

    async fn unbind_app_offer(&self, connect_id: &str, offer_id: Uuid) -> Result<bool, RelayError>;

    /// All `(connect_id, offer_id)` bindings.
    async fn list_app_offers(&self) -> Result<Vec<(String, Uuid)>, RelayError>;

    // --- Customers ---

    async fn get_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, RelayError>;

    /// Inserts the customer or refreshes name and last purchase time of an existing
    /// one with the same phone. Returns the stored row.
    async fn upsert_customer(&self, customer: &Customer) -> Result<Customer, RelayError>;

    /// Adds `delta` (may be negative) to the balance of the customer with `phone`.
    async fn adjust_customer_balance(&self, phone: &str, delta: i64) -> Result<bool, RelayError>;

    async fn list_customers(&self) -> Result<Vec<Customer>, RelayError>;

    // --- Agent commission ---

    /// Adds `amount` to the commission accumulated on `date`.
    async fn add_commission(&self, date: &str, amount: f64) -> Result<(), RelayError>;

    async fn get_commission(&self, date: &str) -> Result<Option<AgentCommission>, RelayError>;

    async fn list_commissions(&self) -> Result<Vec<AgentCommission>, RelayError>;
}
