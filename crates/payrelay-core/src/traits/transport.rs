// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket transport trait for the persistent connection to client apps.

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AuthParams, ConnectedApp, ConnectionState, TransportEvent};

/// Persistent socket channel used to forward payment messages to connected apps.
///
/// Sends are all-or-nothing: `send_message_to_app` only returns `Ok` once the
/// whole payload has been handed to the socket.
#[async_trait]
pub trait SocketTransport: PluginAdapter {
    /// Opens the connection. Fails with [`RelayError::AuthRequired`] before any
    /// socket is opened when either id is blank.
    async fn connect(&self, auth: &AuthParams) -> Result<(), RelayError>;

    /// Emits `payload` to the given app.
    async fn send_message_to_app(&self, app: &ConnectedApp, payload: &str)
    -> Result<(), RelayError>;

    /// Subscribes to server events. Each subscriber sees every event.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// Current connection state plus a stream of changes.
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    /// Closes the connection without reconnecting.
    async fn disconnect(&self) -> Result<(), RelayError>;
}

/// Validates socket credentials, producing the user-facing error when missing.
pub fn check_auth(auth: &AuthParams) -> Result<(), RelayError> {
    if auth.user_id.trim().is_empty() {
        return Err(RelayError::AuthRequired(
            "You are not logged in. Log in as an agent before connecting.".to_string(),
        ));
    }
    if auth.connect_id.trim().is_empty() {
        return Err(RelayError::AuthRequired(
            "No app connect id is configured. Set socket.connect_id before connecting."
                .to_string(),
        ));
    }
    Ok(())
}
