// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound SMS processing: from raw PDUs to a queued transaction.
//!
//! Each intake event is processed on its own task so the caller is never
//! blocked. A message is classified, checked against sender policy,
//! extracted, matched to an offer and persisted. Rejections are terminal
//! and logged; they never reach the queue. A store that is temporarily
//! unavailable is not a rejection: the write is retried with a fixed backoff
//! until it lands or the relay shuts down.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use payrelay_config::model::{DispatchConfig, SmsConfig};
use payrelay_core::types::{Customer, RawSmsMessage, Transaction, TransactionStatus};
use payrelay_core::{RelayError, StorageAdapter};
use payrelay_sms::{
    ClassifyError, ExtractionError, Extractors, MessageKind, Reassembler, ValidationError,
    Validator, classify,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::hooks::{NoopHooks, PipelineHooks};
use crate::offers::OfferCatalog;
use crate::queue::TransactionQueue;

/// Why a message did not become a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Classify(ClassifyError),
    Validation(ValidationError),
    Extraction(ExtractionError),
    /// The store refused the write permanently, or shutdown interrupted the
    /// retries. The message was not remembered, so a re-delivery is admitted.
    Storage(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Classify(e) => write!(f, "{e}"),
            RejectReason::Validation(e) => write!(f, "{e}"),
            RejectReason::Extraction(e) => write!(f, "{e}"),
            RejectReason::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl From<RelayError> for RejectReason {
    fn from(e: RelayError) -> Self {
        RejectReason::Storage(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Admitted { id: Uuid, status: TransactionStatus },
    Rejected(RejectReason),
    RecommendationTimedOut { phone: String },
}

pub struct SmsProcessor {
    reassembler: Reassembler,
    validator: Validator,
    extractors: Extractors,
    catalog: Arc<OfferCatalog>,
    queue: Arc<TransactionQueue>,
    storage: Arc<dyn StorageAdapter>,
    hooks: Arc<dyn PipelineHooks>,
    retry_backoff: Duration,
    cancel: CancellationToken,
}

impl SmsProcessor {
    pub fn new(
        sms: &SmsConfig,
        dispatch: &DispatchConfig,
        catalog: Arc<OfferCatalog>,
        queue: Arc<TransactionQueue>,
        storage: Arc<dyn StorageAdapter>,
    ) -> Self {
        Self {
            reassembler: Reassembler::new(),
            validator: Validator::new(sms),
            extractors: Extractors::default(),
            catalog,
            queue,
            storage,
            hooks: Arc::new(NoopHooks),
            retry_backoff: dispatch.retry_backoff(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop retrying store writes once `cancel` fires.
    pub fn with_shutdown(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PipelineHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Entry point for one intake event. Returns immediately; the batch is
    /// processed on a spawned task whose handle yields the outcomes.
    pub fn on_sms_received(
        self: &Arc<Self>,
        pdus: Vec<Vec<u8>>,
        sim_slot: Option<i32>,
    ) -> JoinHandle<Vec<ProcessOutcome>> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let messages = this.reassembler.assemble(&pdus, sim_slot);
            let mut outcomes = Vec::with_capacity(messages.len());
            for raw in &messages {
                outcomes.push(this.process_message(raw).await);
            }
            outcomes
        })
    }

    /// Run one complete message through the pipeline.
    pub async fn process_message(&self, raw: &RawSmsMessage) -> ProcessOutcome {
        match self.admit(raw).await {
            Ok(outcome) => outcome,
            Err(reason) => {
                error!(sender = %raw.sender, reason = %reason, "message rejected");
                self.hooks.on_rejected(&reason);
                ProcessOutcome::Rejected(reason)
            }
        }
    }

    async fn admit(&self, raw: &RawSmsMessage) -> Result<ProcessOutcome, RejectReason> {
        let text = raw.message.trim();
        let kind = classify(text).map_err(RejectReason::Classify)?;

        match self.validator.check(text, &raw.sender, raw.sim_slot) {
            Ok(()) => {}
            Err(ValidationError::RecommendationTimedOut(phone)) => {
                warn!(phone = %phone, "offer recommendation timed out");
                self.hooks.on_recommendation_timeout(&phone);
                return Ok(ProcessOutcome::RecommendationTimedOut { phone });
            }
            Err(e) => return Err(RejectReason::Validation(e)),
        }
        if let MessageKind::RecommendationTimeout(phone) = &kind {
            self.hooks.on_recommendation_timeout(phone);
            return Ok(ProcessOutcome::RecommendationTimedOut {
                phone: phone.clone(),
            });
        }

        let sms = self
            .extractors
            .extract(&kind, text)
            .map_err(RejectReason::Extraction)?;
        let offer = self.catalog.match_payment(&sms).await;

        let new_customer = Customer::new(sms.sender_name(), sms.sender_phone(), sms.time());
        let mut customer = self
            .persist("customer", || self.storage.upsert_customer(&new_customer))
            .await?;
        // Unmatched money is held on the customer until an offer is assigned.
        let credit = if offer.is_none() { sms.amount() } else { 0 };
        customer.account_balance += credit;

        let tx = Transaction::from_payment(&sms, customer, offer);
        let id = self
            .persist("transaction", || self.queue.create_with_credit(&tx, credit))
            .await?;
        self.validator.remember(text, &raw.sender);
        info!(
            transaction_id = %id,
            kind = %kind,
            amount = tx.amount,
            status = %tx.status,
            "payment admitted"
        );
        self.hooks.on_admitted(&tx);
        Ok(ProcessOutcome::Admitted {
            id,
            status: tx.status,
        })
    }

    /// Run a store write until it succeeds. Transient failures are retried
    /// every `retry_backoff`; anything else, or shutdown, ends the attempt.
    async fn persist<T, F, Fut>(&self, step: &'static str, mut write: F) -> Result<T, RejectReason>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match write().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e.into()),
            };
            attempt += 1;
            warn!(
                step,
                attempt,
                error = %err,
                backoff_ms = self.retry_backoff.as_millis() as u64,
                "store write failed, will retry"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(err.into()),
                _ = tokio::time::sleep(self.retry_backoff) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use payrelay_config::model::{DispatchConfig, PolicyConfig, StorageConfig};
    use payrelay_core::types::Offer;
    use payrelay_storage::SqliteStorage;
    use payrelay_test_utils::FlakyStorage;

    const STANDARD: &str = "QAB1234567 Confirmed. You have received Ksh1,500.00 from JOHN DOE 0712345678 on 5/6/24 at 2:30 PM.";

    #[derive(Default)]
    struct Recorder {
        timeouts: Mutex<Vec<String>>,
        rejected: Mutex<Vec<RejectReason>>,
    }

    impl PipelineHooks for Recorder {
        fn on_recommendation_timeout(&self, phone: &str) {
            self.timeouts.lock().unwrap().push(phone.to_string());
        }

        fn on_rejected(&self, reason: &RejectReason) {
            self.rejected.lock().unwrap().push(reason.clone());
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        flaky: Arc<FlakyStorage>,
        storage: Arc<dyn StorageAdapter>,
        catalog: Arc<OfferCatalog>,
        queue: Arc<TransactionQueue>,
        processor: Arc<SmsProcessor>,
        hooks: Arc<Recorder>,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("pipeline.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let flaky = Arc::new(FlakyStorage::new(Arc::new(storage)));
        let storage: Arc<dyn StorageAdapter> = flaky.clone();
        let catalog = Arc::new(OfferCatalog::load(storage.clone()).await.unwrap());
        let queue = Arc::new(
            TransactionQueue::new(
                storage.clone(),
                &DispatchConfig::default(),
                &PolicyConfig::default(),
            )
            .await
            .unwrap(),
        );
        let hooks = Arc::new(Recorder::default());
        let processor = Arc::new(
            SmsProcessor::new(
                &SmsConfig {
                    site_link_senders: vec!["+254748484118".into()],
                    ..SmsConfig::default()
                },
                &DispatchConfig {
                    retry_backoff_ms: 10,
                    ..DispatchConfig::default()
                },
                catalog.clone(),
                queue.clone(),
                storage.clone(),
            )
            .with_hooks(hooks.clone()),
        );
        Fixture {
            _dir: dir,
            flaky,
            storage,
            catalog,
            queue,
            processor,
            hooks,
        }
    }

    fn raw(sender: &str, text: &str) -> RawSmsMessage {
        RawSmsMessage {
            message: text.to_string(),
            sender: sender.to_string(),
            sim_slot: None,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn matched_payment_is_scheduled() {
        let f = fixture().await;
        f.catalog
            .add(Offer::new("Unlimited", "*544*9#", 1500))
            .await
            .unwrap();
        let outcome = f.processor.process_message(&raw("MPESA", STANDARD)).await;
        let ProcessOutcome::Admitted { id, status } = outcome else {
            panic!("expected admission, got {outcome:?}");
        };
        assert_eq!(status, TransactionStatus::Scheduled);
        let tx = f.queue.get(id).await.unwrap().unwrap();
        assert_eq!(tx.customer.phone, "0712345678");
        assert_eq!(tx.payment_code.as_deref(), Some("QAB1234567"));
        assert_eq!(tx.offer.unwrap().price, 1500);
    }

    #[tokio::test]
    async fn unmatched_payment_is_kept_and_credited() {
        let f = fixture().await;
        let text = "QAB7654321 Confirmed. You have received Ksh37.00 from JANE ROE 0722000000 on 5/6/24 at 2:30 PM.";
        let outcome = f.processor.process_message(&raw("MPESA", text)).await;
        let ProcessOutcome::Admitted { id, status } = outcome else {
            panic!("expected admission, got {outcome:?}");
        };
        assert_eq!(status, TransactionStatus::Unmatched);
        let tx = f.queue.get(id).await.unwrap().unwrap();
        assert!(tx.offer.is_none());
        assert_eq!(tx.amount, 37);
        let customer = f
            .storage
            .get_customer_by_phone("0722000000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.account_balance, 37);
    }

    #[tokio::test]
    async fn recommendation_timeout_creates_no_transaction() {
        let f = fixture().await;
        let outcome = f
            .processor
            .process_message(&raw("MPESA", "Recommendation for 0712345678 timed out"))
            .await;
        assert_eq!(
            outcome,
            ProcessOutcome::RecommendationTimedOut {
                phone: "0712345678".into()
            }
        );
        assert_eq!(f.queue.count().await.unwrap(), 0);
        assert_eq!(*f.hooks.timeouts.lock().unwrap(), vec!["0712345678".to_string()]);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn unknown_text_is_rejected_and_logged() {
        let f = fixture().await;
        let outcome = f.processor.process_message(&raw("MPESA", "Hello there")).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Rejected(RejectReason::Classify(ClassifyError::UnknownMessageKind))
        );
        assert_eq!(f.hooks.rejected.lock().unwrap().len(), 1);
        assert!(logs_contain("message rejected"));
    }

    #[tokio::test]
    async fn unauthorized_sender_is_rejected() {
        let f = fixture().await;
        let outcome = f.processor.process_message(&raw("+254700111222", STANDARD)).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Rejected(RejectReason::Validation(ValidationError::UnauthorizedSender))
        );
    }

    #[tokio::test]
    async fn duplicate_delivery_is_admitted_once() {
        let f = fixture().await;
        let first = f.processor.process_message(&raw("MPESA", STANDARD)).await;
        let second = f.processor.process_message(&raw("MPESA", STANDARD)).await;
        assert!(matches!(first, ProcessOutcome::Admitted { .. }));
        assert_eq!(
            second,
            ProcessOutcome::Rejected(RejectReason::Validation(ValidationError::DuplicateMessage))
        );
        assert_eq!(f.queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn store_outage_is_retried_until_the_write_lands() {
        let f = fixture().await;
        f.flaky.fail_next_writes(3);
        let text = "QAB7654321 Confirmed. You have received Ksh37.00 from JANE ROE 0722000000 on 5/6/24 at 2:30 PM.";
        let outcome = f.processor.process_message(&raw("MPESA", text)).await;
        assert!(matches!(
            outcome,
            ProcessOutcome::Admitted {
                status: TransactionStatus::Unmatched,
                ..
            }
        ));
        assert_eq!(f.flaky.failed_writes(), 3);
        assert_eq!(f.queue.count().await.unwrap(), 1);
        let customer = f
            .storage
            .get_customer_by_phone("0722000000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.account_balance, 37);
        assert!(logs_contain("store write failed, will retry"));
        assert!(f.hooks.rejected.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_during_outage_leaves_message_redeliverable() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        let processor = SmsProcessor::new(
            &SmsConfig::default(),
            &DispatchConfig {
                retry_backoff_ms: 10,
                ..DispatchConfig::default()
            },
            f.catalog.clone(),
            f.queue.clone(),
            f.storage.clone(),
        )
        .with_shutdown(cancel.clone());
        let text = "QAB7654321 Confirmed. You have received Ksh37.00 from JANE ROE 0722000000 on 5/6/24 at 2:30 PM.";

        f.flaky.set_failing(true);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let outcome = processor.process_message(&raw("MPESA", text)).await;
        stopper.await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Rejected(RejectReason::Storage(_))));
        assert_eq!(f.queue.count().await.unwrap(), 0);
        assert!(f.storage.get_customer_by_phone("0722000000").await.unwrap().is_none());

        f.flaky.set_failing(false);
        let outcome = processor.process_message(&raw("MPESA", text)).await;
        assert!(matches!(outcome, ProcessOutcome::Admitted { .. }));
        assert_eq!(f.queue.count().await.unwrap(), 1);
        let customer = f
            .storage
            .get_customer_by_phone("0722000000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.account_balance, 37);
    }

    #[tokio::test]
    async fn site_link_without_code_is_rejected() {
        let f = fixture().await;
        let outcome = f
            .processor
            .process_message(&raw("+254748484118", "BHSL 0748481418:250"))
            .await;
        assert_eq!(
            outcome,
            ProcessOutcome::Rejected(RejectReason::Extraction(ExtractionError::InvalidPaymentCode))
        );
    }

    #[tokio::test]
    async fn site_link_matches_site_linked_offer() {
        let f = fixture().await;
        let mut offer = Offer::new("Site 250", "*250#", 250);
        offer.is_site_linked = true;
        f.catalog.add(offer).await.unwrap();
        let outcome = f
            .processor
            .process_message(&raw(
                "+254748484118",
                "BHSL 0748481418:250:QWE123XR Payment Confirmed",
            ))
            .await;
        assert!(matches!(
            outcome,
            ProcessOutcome::Admitted {
                status: TransactionStatus::Scheduled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn pdu_batch_is_processed_off_the_caller() {
        let f = fixture().await;
        let pdus = payrelay_sms::decode_hex_pdus(&[
            "004409D04D68711A04000042605011030021540500032A0201A241614C36A3D56C37D0F0ED36A7E5ED32D905CABEEB2074D85E06C9CBE372DA5E26839673748C5583C15C3018C82C7FB741CA27D209223E8B20D82D269BD16AB61B0E04",
            "004409D04D68711A040000426050110300211C0500032A0202DE6E50ED657BC968A0301D24D3CD602068D305",
        ])
        .unwrap();
        let outcomes = f.processor.on_sms_received(pdus, Some(0)).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0],
            ProcessOutcome::Admitted {
                status: TransactionStatus::Unmatched,
                ..
            }
        ));
    }
}
