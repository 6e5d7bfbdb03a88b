// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable transaction queue.
//!
//! The store is the only copy of undelivered work. Nothing here caches a
//! transaction between calls: every peek re-reads the table so a restart
//! loses nothing. Queue depth is published through a `watch` channel and
//! admissions ring a [`Notify`] the dispatcher waits on.

use std::sync::Arc;

use payrelay_config::model::{DispatchConfig, PolicyConfig};
use payrelay_core::types::{
    EpochMillis, Offer, RescheduleInfo, RescheduleMode, Transaction, TransactionStatus,
};
use payrelay_core::{RelayError, StorageAdapter};
use tokio::sync::{Notify, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct TransactionQueue {
    storage: Arc<dyn StorageAdapter>,
    max_retries: u32,
    forward_unmatched: bool,
    count_tx: watch::Sender<u64>,
    wake: Arc<Notify>,
}

impl TransactionQueue {
    pub async fn new(
        storage: Arc<dyn StorageAdapter>,
        dispatch: &DispatchConfig,
        policy: &PolicyConfig,
    ) -> Result<Self, RelayError> {
        let count = storage.count_transactions().await?;
        let (count_tx, _) = watch::channel(count);
        Ok(Self {
            storage,
            max_retries: policy.max_retries,
            forward_unmatched: dispatch.forward_unmatched,
            count_tx,
            wake: Arc::new(Notify::new()),
        })
    }

    /// Persist a new transaction and wake the dispatcher.
    pub async fn create(&self, tx: &Transaction) -> Result<Uuid, RelayError> {
        self.insert(tx, 0).await
    }

    /// Persist a new transaction and add `credit` to its customer's held
    /// balance. Either both land or neither does.
    pub async fn create_with_credit(&self, tx: &Transaction, credit: i64) -> Result<Uuid, RelayError> {
        self.insert(tx, credit).await
    }

    async fn insert(&self, tx: &Transaction, credit: i64) -> Result<Uuid, RelayError> {
        if !tx.is_consistent() {
            return Err(RelayError::Internal(format!(
                "transaction {} has no offer but status {}",
                tx.id, tx.status
            )));
        }
        let id = if credit == 0 {
            self.storage.insert_transaction(tx).await?
        } else {
            self.storage.insert_transaction_with_balance(tx, credit).await?
        };
        debug!(transaction_id = %id, status = %tx.status, time = tx.time, credit, "transaction queued");
        self.publish_count().await;
        self.wake.notify_one();
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Transaction>, RelayError> {
        self.storage.get_transaction(id).await
    }

    /// The transaction with the smallest `time`, whatever its status.
    pub async fn peek_oldest(&self) -> Result<Option<Transaction>, RelayError> {
        self.storage.oldest_transaction(false).await
    }

    /// The oldest transaction the dispatcher may deliver.
    ///
    /// Unmatched transactions stay parked for an operator unless
    /// `dispatch.forward_unmatched` is set.
    pub async fn peek_oldest_deliverable(&self) -> Result<Option<Transaction>, RelayError> {
        self.storage.oldest_transaction(!self.forward_unmatched).await
    }

    /// Idempotent: deleting an absent transaction returns `Ok(false)`.
    pub async fn delete(&self, id: Uuid) -> Result<bool, RelayError> {
        let removed = self.storage.delete_transaction(id).await?;
        if removed {
            self.publish_count().await;
        }
        Ok(removed)
    }

    pub async fn count(&self) -> Result<u64, RelayError> {
        self.storage.count_transactions().await
    }

    /// Current depth plus every later change.
    pub fn subscribe_count(&self) -> watch::Receiver<u64> {
        self.count_tx.subscribe()
    }

    pub async fn list(&self) -> Result<Vec<Transaction>, RelayError> {
        self.storage.list_transactions().await
    }

    /// Move a transaction to a new delivery time.
    ///
    /// An unmatched transaction keeps its status: without an offer it cannot
    /// be anything else.
    pub async fn reschedule(
        &self,
        id: Uuid,
        time: EpochMillis,
        mode: RescheduleMode,
    ) -> Result<Transaction, RelayError> {
        let mut tx = self.require(id).await?;
        tx.time = time;
        tx.reschedule_info = Some(RescheduleInfo {
            parent_transaction_id: tx.id,
            time,
            mode,
        });
        if tx.offer.is_some() {
            tx.status = TransactionStatus::Rescheduled;
        }
        self.save(&tx).await?;
        info!(transaction_id = %id, time, mode = %mode, "transaction rescheduled");
        self.wake.notify_one();
        Ok(tx)
    }

    /// Operator-triggered retry, bounded by `policy.max_retries`.
    pub async fn retry(&self, id: Uuid) -> Result<Transaction, RelayError> {
        let mut tx = self.require(id).await?;
        if tx.retries >= self.max_retries {
            warn!(transaction_id = %id, retries = tx.retries, "retry limit reached");
            return Err(RelayError::RetryLimitExceeded {
                id: id.to_string(),
                retries: tx.retries,
                max: self.max_retries,
            });
        }
        tx.retries += 1;
        if tx.offer.is_some() {
            tx.status = TransactionStatus::Scheduled;
        }
        self.save(&tx).await?;
        info!(transaction_id = %id, retries = tx.retries, "transaction retried");
        self.wake.notify_one();
        Ok(tx)
    }

    /// Attach an offer to a held transaction and schedule it.
    ///
    /// The customer's held balance is debited by the transaction amount in
    /// the same commit that schedules the transaction.
    pub async fn assign_offer(&self, id: Uuid, offer: Offer) -> Result<Transaction, RelayError> {
        let mut tx = self.require(id).await?;
        let debit = if tx.status == TransactionStatus::Unmatched {
            tx.amount
        } else {
            0
        };
        tx.offer = Some(offer);
        tx.status = TransactionStatus::Scheduled;
        tx.customer.account_balance -= debit;
        if !self.storage.update_transaction_with_balance(&tx, -debit).await? {
            return Err(RelayError::NotFound {
                entity: "transaction",
                id: id.to_string(),
            });
        }
        debug!(transaction_id = %id, debit, "offer assigned");
        self.wake.notify_one();
        Ok(tx)
    }

    /// Shared wake-up signal rung on every admission or status change.
    pub fn wake_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    async fn require(&self, id: Uuid) -> Result<Transaction, RelayError> {
        self.storage
            .get_transaction(id)
            .await?
            .ok_or_else(|| RelayError::NotFound {
                entity: "transaction",
                id: id.to_string(),
            })
    }

    async fn save(&self, tx: &Transaction) -> Result<(), RelayError> {
        if self.storage.update_transaction(tx).await? {
            Ok(())
        } else {
            Err(RelayError::NotFound {
                entity: "transaction",
                id: tx.id.to_string(),
            })
        }
    }

    async fn publish_count(&self) {
        match self.storage.count_transactions().await {
            Ok(count) => {
                self.count_tx.send_replace(count);
            }
            Err(e) => warn!(error = %e, "failed to refresh queue depth"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrelay_config::model::StorageConfig;
    use payrelay_core::types::{Customer, PaymentDetails, SmsMessage};
    use payrelay_storage::SqliteStorage;
    use proptest::prelude::*;

    async fn queue_with(
        dispatch: DispatchConfig,
        policy: PolicyConfig,
    ) -> (tempfile::TempDir, Arc<dyn StorageAdapter>, TransactionQueue) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("queue.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);
        let queue = TransactionQueue::new(storage.clone(), &dispatch, &policy)
            .await
            .unwrap();
        (dir, storage, queue)
    }

    async fn queue() -> (tempfile::TempDir, Arc<dyn StorageAdapter>, TransactionQueue) {
        queue_with(DispatchConfig::default(), PolicyConfig::default()).await
    }

    fn tx(amount: i64, time: EpochMillis, offer: Option<Offer>) -> Transaction {
        let sms = SmsMessage::StandardPayment(PaymentDetails {
            sender_name: "John Doe".into(),
            sender_phone: "0712345678".into(),
            amount,
            message: format!("received Ksh{amount}.00"),
            time,
            payment_code: None,
        });
        Transaction::from_payment(&sms, Customer::new("John Doe", "0712345678", time), offer)
    }

    async fn balance(storage: &Arc<dyn StorageAdapter>) -> i64 {
        storage
            .get_customer_by_phone("0712345678")
            .await
            .unwrap()
            .unwrap()
            .account_balance
    }

    fn matched(time: EpochMillis) -> Transaction {
        tx(50, time, Some(Offer::new("1GB", "*544*1#", 50)))
    }

    #[tokio::test]
    async fn delete_twice_is_a_no_op() {
        let (_dir, _storage, queue) = queue().await;
        let id = queue.create(&matched(1)).await.unwrap();
        assert!(queue.delete(id).await.unwrap());
        let after_first = queue.list().await.unwrap();
        assert!(!queue.delete(id).await.unwrap());
        assert_eq!(queue.list().await.unwrap(), after_first);
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn count_is_observable() {
        let (_dir, _storage, queue) = queue().await;
        let mut rx = queue.subscribe_count();
        assert_eq!(*rx.borrow(), 0);

        let id = queue.create(&matched(1)).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        queue.delete(id).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 0);
    }

    #[tokio::test]
    async fn create_rings_wake_signal() {
        let (_dir, _storage, queue) = queue().await;
        let wake = queue.wake_signal();
        queue.create(&matched(1)).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), wake.notified())
            .await
            .expect("wake permit stored");
    }

    #[tokio::test]
    async fn inconsistent_transaction_is_refused() {
        let (_dir, _storage, queue) = queue().await;
        let mut bad = tx(37, 1, None);
        bad.status = TransactionStatus::Scheduled;
        assert!(matches!(queue.create(&bad).await, Err(RelayError::Internal(_))));
    }

    #[tokio::test]
    async fn unmatched_are_skipped_unless_forwarded() {
        let (_dir, _storage, queue) = queue().await;
        queue.create(&tx(37, 1, None)).await.unwrap();
        let later = queue.create(&matched(2)).await.unwrap();
        assert_eq!(queue.peek_oldest().await.unwrap().unwrap().amount, 37);
        assert_eq!(queue.peek_oldest_deliverable().await.unwrap().unwrap().id, later);

        let (_dir2, _s2, forwarding) = queue_with(
            DispatchConfig {
                forward_unmatched: true,
                ..DispatchConfig::default()
            },
            PolicyConfig::default(),
        )
        .await;
        forwarding.create(&tx(37, 1, None)).await.unwrap();
        assert_eq!(
            forwarding.peek_oldest_deliverable().await.unwrap().unwrap().amount,
            37
        );
    }

    #[tokio::test]
    async fn retry_stops_at_the_limit() {
        let (_dir, _storage, queue) = queue_with(
            DispatchConfig::default(),
            PolicyConfig {
                max_retries: 2,
                ..PolicyConfig::default()
            },
        )
        .await;
        let id = queue.create(&matched(1)).await.unwrap();
        assert_eq!(queue.retry(id).await.unwrap().retries, 1);
        assert_eq!(queue.retry(id).await.unwrap().retries, 2);
        let err = queue.retry(id).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::RetryLimitExceeded { retries: 2, max: 2, .. }
        ));
        assert_eq!(queue.get(id).await.unwrap().unwrap().retries, 2);
    }

    #[tokio::test]
    async fn retry_of_missing_transaction_is_not_found() {
        let (_dir, _storage, queue) = queue().await;
        assert!(matches!(
            queue.retry(Uuid::new_v4()).await,
            Err(RelayError::NotFound { entity: "transaction", .. })
        ));
    }

    #[tokio::test]
    async fn reschedule_moves_the_item_in_time() {
        let (_dir, _storage, queue) = queue().await;
        let first = queue.create(&matched(1)).await.unwrap();
        let second = queue.create(&matched(2)).await.unwrap();

        let moved = queue
            .reschedule(first, 10, RescheduleMode::Manual)
            .await
            .unwrap();
        assert_eq!(moved.status, TransactionStatus::Rescheduled);
        assert_eq!(moved.reschedule_info.unwrap().mode, RescheduleMode::Manual);
        assert_eq!(queue.peek_oldest().await.unwrap().unwrap().id, second);
    }

    #[tokio::test]
    async fn assign_offer_schedules_and_debits_held_balance() {
        let (_dir, storage, queue) = queue().await;
        let held = tx(37, 1, None);
        storage.upsert_customer(&held.customer).await.unwrap();
        storage.adjust_customer_balance("0712345678", 37).await.unwrap();
        let id = queue.create(&held).await.unwrap();

        let offer = Offer::new("Special", "*37#", 37);
        let updated = queue.assign_offer(id, offer.clone()).await.unwrap();
        assert_eq!(updated.status, TransactionStatus::Scheduled);
        assert_eq!(updated.offer.as_ref().map(|o| o.id), Some(offer.id));
        assert_eq!(
            storage
                .get_customer_by_phone("0712345678")
                .await
                .unwrap()
                .unwrap()
                .account_balance,
            0
        );
        assert_eq!(queue.peek_oldest_deliverable().await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn create_with_credit_is_all_or_nothing() {
        let (_dir, storage, _) = queue().await;
        let flaky = Arc::new(payrelay_test_utils::FlakyStorage::new(storage.clone()));
        let queue = TransactionQueue::new(
            flaky.clone(),
            &DispatchConfig::default(),
            &PolicyConfig::default(),
        )
        .await
        .unwrap();
        let held = tx(37, 1, None);
        storage.upsert_customer(&held.customer).await.unwrap();

        flaky.fail_next_writes(1);
        assert!(queue.create_with_credit(&held, 37).await.is_err());
        assert_eq!(queue.count().await.unwrap(), 0);
        assert_eq!(balance(&storage).await, 0);

        queue.create_with_credit(&held, 37).await.unwrap();
        assert_eq!(queue.count().await.unwrap(), 1);
        assert_eq!(balance(&storage).await, 37);
    }

    #[tokio::test]
    async fn failed_assignment_keeps_transaction_held_and_balance_intact() {
        let (_dir, storage, _) = queue().await;
        let flaky = Arc::new(payrelay_test_utils::FlakyStorage::new(storage.clone()));
        let queue = TransactionQueue::new(
            flaky.clone(),
            &DispatchConfig::default(),
            &PolicyConfig::default(),
        )
        .await
        .unwrap();
        let held = tx(37, 1, None);
        storage.upsert_customer(&held.customer).await.unwrap();
        let id = queue.create_with_credit(&held, 37).await.unwrap();

        flaky.fail_next_writes(1);
        assert!(queue.assign_offer(id, Offer::new("Special", "*37#", 37)).await.is_err());
        let stored = queue.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Unmatched);
        assert!(stored.offer.is_none());
        assert_eq!(balance(&storage).await, 37);

        let updated = queue.assign_offer(id, Offer::new("Special", "*37#", 37)).await.unwrap();
        assert_eq!(updated.customer.account_balance, 0);
        assert_eq!(balance(&storage).await, 0);
    }

    #[tokio::test]
    async fn assigning_a_missing_transaction_is_not_found() {
        let (_dir, _storage, queue) = queue().await;
        let err = queue
            .assign_offer(Uuid::new_v4(), Offer::new("Special", "*37#", 37))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound { entity: "transaction", .. }));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn oldest_has_minimum_time(times in prop::collection::vec(0i64..1_000, 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let (_dir, _storage, queue) = queue().await;
                for t in &times {
                    queue.create(&matched(*t)).await.unwrap();
                }
                let oldest = queue.peek_oldest().await.unwrap().unwrap();
                prop_assert_eq!(oldest.time, *times.iter().min().unwrap());
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
