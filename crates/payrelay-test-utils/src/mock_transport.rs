// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock socket transport for deterministic testing.
//!
//! `MockTransport` implements `SocketTransport`, capturing every forwarded
//! payload and letting tests inject send failures, server events and
//! connection state changes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, watch};

use payrelay_core::traits::transport::check_auth;
use payrelay_core::types::{
    AdapterType, AuthParams, ConnectedApp, ConnectionState, HealthStatus, TransportEvent,
};
use payrelay_core::{PluginAdapter, RelayError, SocketTransport};

/// A payload handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub connect_id: String,
    pub payload: String,
}

pub struct MockTransport {
    sent: Mutex<Vec<SentMessage>>,
    fail_next: AtomicUsize,
    reject_next: AtomicUsize,
    failing: AtomicBool,
    attempts: AtomicUsize,
    events: broadcast::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
}

impl MockTransport {
    /// A transport that is already connected.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        let (state, _) = watch::channel(ConnectionState::Connected);
        Self {
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
            reject_next: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            events,
            state,
        }
    }

    /// Fail the next `n` sends, then succeed again.
    pub fn fail_next_sends(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Refuse the next `n` sends with a non-transient authorization error.
    pub fn reject_next_sends(&self, n: usize) {
        self.reject_next.store(n, Ordering::SeqCst);
    }

    /// Fail every send until switched off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful sends, in order.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Every call to `send_message_to_app`, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Deliver a server event to all subscribers.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl SocketTransport for MockTransport {
    async fn connect(&self, auth: &AuthParams) -> Result<(), RelayError> {
        check_auth(auth)?;
        self.state.send_replace(ConnectionState::Connected);
        Ok(())
    }

    async fn send_message_to_app(
        &self,
        app: &ConnectedApp,
        payload: &str,
    ) -> Result<(), RelayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::transport("mock transport failing"));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RelayError::transport("injected send failure"));
        }
        let refused = self
            .reject_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(RelayError::AuthRequired("connect id refused".to_string()));
        }
        self.sent.lock().await.push(SentMessage {
            connect_id: app.connect_id.clone(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    async fn disconnect(&self) -> Result<(), RelayError> {
        self.state.send_replace(ConnectionState::Disconnected);
        Ok(())
    }
}
