// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery dispatcher: drains the transaction queue to connected apps.
//!
//! A cycle repeatedly takes the oldest deliverable transaction, picks the
//! next online app for its offer, sends, and only then deletes. A missing
//! target is a stall and a failed send is a retry; both wait a fixed backoff
//! and start over from the store, leaving the transaction in place. A cycle
//! ends when the queue is empty; [`Dispatcher::run`] then sleeps until the
//! next wake-up.

use std::sync::Arc;

use chrono::Local;
use payrelay_config::model::{DispatchConfig, PolicyConfig};
use payrelay_core::types::{ConnectedApp, ConnectionState, Transaction};
use payrelay_core::{SocketTransport, StorageAdapter};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hooks::{DispatchObserver, NoopHooks};
use crate::queue::TransactionQueue;
use crate::registry::AppRegistry;

/// States of one dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchState {
    Draining,
    SelectingTarget,
    Sending,
    Succeeded,
    /// No online app can take the head transaction.
    Stalled,
    RetryBackoff,
    Terminated,
}

/// Why [`Dispatcher::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DispatchExit {
    Cancelled,
    /// The transport gave up reconnecting.
    TransportLost,
}

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEnd {
    Drained { delivered: usize },
    Exit(DispatchExit),
}

pub struct Dispatcher {
    queue: Arc<TransactionQueue>,
    registry: Arc<AppRegistry>,
    transport: Arc<dyn SocketTransport>,
    storage: Arc<dyn StorageAdapter>,
    config: DispatchConfig,
    commission_rate: f64,
    observer: Arc<dyn DispatchObserver>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<TransactionQueue>,
        registry: Arc<AppRegistry>,
        transport: Arc<dyn SocketTransport>,
        storage: Arc<dyn StorageAdapter>,
        dispatch: &DispatchConfig,
        policy: &PolicyConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            transport,
            storage,
            config: dispatch.clone(),
            commission_rate: policy.commission_rate,
            observer: Arc::new(NoopHooks),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Drain, then wait for a queue wake-up, an app change or the periodic
    /// wake interval, until cancelled or the transport is lost.
    pub async fn run(&self, cancel: CancellationToken) -> DispatchExit {
        info!("dispatcher started");
        self.observer.on_start();
        let wake = self.queue.wake_signal();
        let apps_changed = self.registry.changes();
        let mut connection = self.transport.connection_state();

        loop {
            match self.run_cycle(&cancel).await {
                CycleEnd::Exit(exit) => {
                    info!(exit = %exit, "dispatcher stopped");
                    return exit;
                }
                CycleEnd::Drained { delivered } => {
                    debug!(delivered, "queue drained");
                    self.observer.on_idle();
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(exit = %DispatchExit::Cancelled, "dispatcher stopped");
                    return DispatchExit::Cancelled;
                }
                _ = transport_lost(&mut connection) => {
                    warn!("transport lost, dispatcher stopping");
                    return DispatchExit::TransportLost;
                }
                _ = wake.notified() => {}
                _ = apps_changed.notified() => {}
                _ = tokio::time::sleep(self.config.wake_interval()) => {}
            }
        }
    }

    /// Deliver until the queue has nothing deliverable left.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleEnd {
        let mut connection = self.transport.connection_state();
        let mut delivered = 0;

        loop {
            if cancel.is_cancelled() {
                return CycleEnd::Exit(DispatchExit::Cancelled);
            }
            if *connection.borrow_and_update() == ConnectionState::Failed {
                return CycleEnd::Exit(DispatchExit::TransportLost);
            }

            enter(DispatchState::Draining);
            let tx = match self.queue.peek_oldest_deliverable().await {
                Ok(Some(tx)) => tx,
                Ok(None) => {
                    enter(DispatchState::Terminated);
                    return CycleEnd::Drained { delivered };
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(error = %e, "failed to read transaction queue");
                    } else {
                        error!(error = %e, "failed to read transaction queue");
                    }
                    enter(DispatchState::RetryBackoff);
                    if let Some(exit) = self
                        .backoff(self.config.retry_backoff(), cancel, &mut connection)
                        .await
                    {
                        return CycleEnd::Exit(exit);
                    }
                    continue;
                }
            };

            enter(DispatchState::SelectingTarget);
            let key = tx.cursor_key();
            let targets = self.registry.online_targets(tx.offer.as_ref()).await;
            let Some((index, app)) = self.registry.select_target(&key, &targets).await else {
                enter(DispatchState::Stalled);
                warn!(transaction_id = %tx.id, offer_key = %key, "no online app for transaction");
                if let Some(exit) = self
                    .backoff(self.config.stall_backoff(), cancel, &mut connection)
                    .await
                {
                    return CycleEnd::Exit(exit);
                }
                continue;
            };

            enter(DispatchState::Sending);
            self.observer.on_message(&tx, &app);
            match self
                .transport
                .send_message_to_app(&app, &tx.mpesa_message)
                .await
            {
                Ok(()) => {
                    enter(DispatchState::Succeeded);
                    self.complete(&tx, &app, &key, index).await;
                    delivered += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(
                            transaction_id = %tx.id,
                            connect_id = %app.connect_id,
                            error = %e,
                            "delivery failed, will retry"
                        );
                    } else {
                        // Still retried: the transaction stays at the head.
                        error!(
                            transaction_id = %tx.id,
                            connect_id = %app.connect_id,
                            error = %e,
                            "delivery refused, will retry"
                        );
                    }
                    enter(DispatchState::RetryBackoff);
                    if let Some(exit) = self
                        .backoff(self.config.retry_backoff(), cancel, &mut connection)
                        .await
                    {
                        return CycleEnd::Exit(exit);
                    }
                }
            }
        }
    }

    /// Post-send bookkeeping. The payload is already out, so failures here
    /// are logged and never turn into a resend of a different item.
    async fn complete(&self, tx: &Transaction, app: &ConnectedApp, key: &str, index: usize) {
        if let Err(e) = self
            .registry
            .commit_delivery(&app.connect_id, key, index)
            .await
        {
            error!(connect_id = %app.connect_id, error = %e, "failed to record delivery");
        }
        if let Err(e) = self.queue.delete(tx.id).await {
            error!(transaction_id = %tx.id, error = %e, "failed to remove delivered transaction");
        }

        let commission = tx.amount as f64 * self.commission_rate;
        let date = Local::now().format("%Y-%m-%d").to_string();
        if let Err(e) = self.storage.add_commission(&date, commission).await {
            warn!(date = %date, error = %e, "failed to record commission");
        }

        info!(
            transaction_id = %tx.id,
            connect_id = %app.connect_id,
            amount = tx.amount,
            "transaction delivered"
        );
    }

    async fn backoff(
        &self,
        delay: std::time::Duration,
        cancel: &CancellationToken,
        connection: &mut watch::Receiver<ConnectionState>,
    ) -> Option<DispatchExit> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => None,
            _ = cancel.cancelled() => Some(DispatchExit::Cancelled),
            _ = transport_lost(connection) => Some(DispatchExit::TransportLost),
        }
    }
}

fn enter(state: DispatchState) {
    debug!(state = %state, "dispatch state");
}

/// Resolves once the connection is `Failed` or its sender is gone.
async fn transport_lost(connection: &mut watch::Receiver<ConnectionState>) {
    let _ = connection
        .wait_for(|state| *state == ConnectionState::Failed)
        .await;
}
