// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket implementation of [`SocketTransport`].
//!
//! One background task owns the socket. Sends are queued to it over an
//! `mpsc` channel together with a `oneshot` acknowledgement that resolves
//! only after the frame has been flushed. A send whose caller has already
//! given up is discarded instead of written late.
//!
//! When the server drops the connection the task reconnects with
//! exponential backoff. After `max_reconnect_attempts` consecutive failures
//! the state becomes [`ConnectionState::Failed`] and the task exits.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use payrelay_config::model::SocketConfig;
use payrelay_core::traits::transport::check_auth;
use payrelay_core::types::{
    AdapterType, AuthParams, ConnectedApp, ConnectionState, HealthStatus, TransportEvent,
};
use payrelay_core::{PluginAdapter, RelayError, SocketTransport};

use crate::frame::{forward_frame, parse_event};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECONNECT_BASE_MS: u64 = 250;
const RECONNECT_MAX_MS: u64 = 30_000;

struct Outgoing {
    text: String,
    ack: oneshot::Sender<Result<(), RelayError>>,
}

/// A running connection: its send queue, stop token and task.
struct Session {
    outbound: mpsc::Sender<Outgoing>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

enum SessionEnd {
    Stopped,
    Lost(String),
}

pub struct WsTransport {
    config: SocketConfig,
    events: broadcast::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Option<Session>>,
}

/// Reconnect delay for the given zero-based attempt, capped.
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.min(16));
    Duration::from_millis(RECONNECT_BASE_MS.saturating_mul(factor).min(RECONNECT_MAX_MS))
}

/// Server URL with both ids in the query string.
pub fn connection_url(base: &str, auth: &AuthParams) -> Result<Url, RelayError> {
    let mut url =
        Url::parse(base).map_err(|e| RelayError::Config(format!("invalid socket url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("user_id", &auth.user_id)
        .append_pair("connect_id", &auth.connect_id);
    Ok(url)
}

impl WsTransport {
    pub fn new(config: SocketConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            events,
            state,
            session: Mutex::new(None),
        }
    }

    async fn open(&self, url: &Url) -> Result<Socket, RelayError> {
        let timeout = self.config.connect_timeout();
        match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
            Ok(Ok((socket, response))) => {
                debug!(status = %response.status(), "websocket handshake complete");
                Ok(socket)
            }
            Ok(Err(e)) => Err(RelayError::Transport {
                message: format!("connection to {} failed", url.host_str().unwrap_or("server")),
                source: Some(Box::new(e)),
            }),
            Err(_) => Err(RelayError::Timeout { duration: timeout }),
        }
    }
}

#[async_trait]
impl PluginAdapter for WsTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(match *self.state.borrow() {
            ConnectionState::Connected => HealthStatus::Healthy,
            ConnectionState::Connecting => HealthStatus::Degraded("connecting".into()),
            ConnectionState::Disconnected => HealthStatus::Degraded("not connected".into()),
            ConnectionState::Failed => {
                HealthStatus::Unhealthy("reconnection attempts exhausted".into())
            }
        })
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.disconnect().await
    }
}

#[async_trait]
impl SocketTransport for WsTransport {
    async fn connect(&self, auth: &AuthParams) -> Result<(), RelayError> {
        check_auth(auth)?;
        let url = connection_url(&self.config.url, auth)?;

        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref()
            && !existing.task.is_finished()
        {
            debug!("already connected");
            return Ok(());
        }

        self.state.send_replace(ConnectionState::Connecting);
        let socket = match self.open(&url).await {
            Ok(socket) => socket,
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        self.state.send_replace(ConnectionState::Connected);
        info!(host = url.host_str().unwrap_or(""), "socket connected");

        let (outbound, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let driver = Driver {
            url,
            connect_timeout: self.config.connect_timeout(),
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            events: self.events.clone(),
            state: self.state.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run(socket, rx));
        *session = Some(Session {
            outbound,
            cancel,
            task,
        });
        Ok(())
    }

    async fn send_message_to_app(
        &self,
        app: &ConnectedApp,
        payload: &str,
    ) -> Result<(), RelayError> {
        if *self.state.borrow() != ConnectionState::Connected {
            return Err(RelayError::transport("socket is not connected"));
        }
        let outbound = self
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.outbound.clone())
            .ok_or_else(|| RelayError::transport("socket is not connected"))?;

        let (ack, done) = oneshot::channel();
        let text = forward_frame(&self.config.send_event, &app.connect_id, payload);
        outbound
            .send(Outgoing { text, ack })
            .await
            .map_err(|_| RelayError::transport("socket task stopped"))?;

        let timeout = self.config.send_timeout();
        match tokio::time::timeout(timeout, done).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RelayError::transport("connection lost before send completed")),
            Err(_) => Err(RelayError::Timeout { duration: timeout }),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    async fn disconnect(&self) -> Result<(), RelayError> {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.cancel.cancel();
            drop(session.outbound);
            if tokio::time::timeout(Duration::from_secs(5), session.task)
                .await
                .is_err()
            {
                warn!("socket task did not stop in time");
            }
        }
        self.state.send_replace(ConnectionState::Disconnected);
        info!("socket disconnected");
        Ok(())
    }
}

/// State owned by the background connection task.
struct Driver {
    url: Url,
    connect_timeout: Duration,
    max_reconnect_attempts: u32,
    events: broadcast::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(self, mut socket: Socket, mut rx: mpsc::Receiver<Outgoing>) {
        loop {
            match self.serve(socket, &mut rx).await {
                SessionEnd::Stopped => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    return;
                }
                SessionEnd::Lost(reason) => {
                    warn!(reason = %reason, "socket connection lost");
                    self.state.send_replace(ConnectionState::Disconnected);
                }
            }
            match self.reconnect().await {
                Some(next) => socket = next,
                None => return,
            }
        }
    }

    /// Pump one connection until it closes or the transport is stopped.
    async fn serve(&self, socket: Socket, rx: &mut mpsc::Receiver<Outgoing>) -> SessionEnd {
        let (mut write, mut read) = socket.split();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Stopped;
                }
                out = rx.recv() => {
                    let Some(out) = out else {
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Stopped;
                    };
                    if out.ack.is_closed() {
                        debug!("dropping send abandoned by caller");
                        continue;
                    }
                    match write.send(Message::Text(out.text.into())).await {
                        Ok(()) => {
                            let _ = out.ack.send(Ok(()));
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            let _ = out.ack.send(Err(RelayError::Transport {
                                message: "socket write failed".into(),
                                source: Some(Box::new(e)),
                            }));
                            return SessionEnd::Lost(reason);
                        }
                    }
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match parse_event(&text) {
                        Some(event) => {
                            debug!(?event, "socket event");
                            let _ = self.events.send(event);
                        }
                        None => debug!("ignoring malformed frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Lost("closed by server".into());
                    }
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    /// Returns `None` when stopped or when attempts are exhausted.
    async fn reconnect(&self) -> Option<Socket> {
        for attempt in 0..self.max_reconnect_attempts {
            let delay = backoff_delay(attempt);
            debug!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    return None;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            self.state.send_replace(ConnectionState::Connecting);
            let result = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str())).await;
            match result {
                Ok(Ok((socket, _))) => {
                    info!(attempt = attempt + 1, "socket reconnected");
                    self.state.send_replace(ConnectionState::Connected);
                    return Some(socket);
                }
                Ok(Err(e)) => warn!(attempt = attempt + 1, error = %e, "reconnect failed"),
                Err(_) => warn!(attempt = attempt + 1, "reconnect timed out"),
            }
            self.state.send_replace(ConnectionState::Disconnected);
        }
        error!(
            attempts = self.max_reconnect_attempts,
            "giving up on socket reconnection"
        );
        self.state.send_replace(ConnectionState::Failed);
        None
    }
}
