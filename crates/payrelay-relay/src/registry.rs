// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connected-app registry and round-robin delivery cursors.
//!
//! App rows, offer bindings and the per-offer cursor all live behind one
//! lock. `commit_delivery` advances a cursor and bumps `messages_sent` in a
//! single critical section, so two deliveries can never observe a half
//! updated pair.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use payrelay_core::types::{ConnectedApp, ConnectionState, Offer, TransportEvent};
use payrelay_core::{RelayError, StorageAdapter};
use tokio::sync::{Mutex, Notify, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Default)]
struct RegistryState {
    /// Registration order; round-robin indexes refer to this order.
    apps: Vec<ConnectedApp>,
    bindings: HashMap<String, HashSet<Uuid>>,
    /// Last used index per cursor key.
    cursors: HashMap<String, usize>,
}

pub struct AppRegistry {
    storage: Arc<dyn StorageAdapter>,
    state: Mutex<RegistryState>,
    changed: Arc<Notify>,
}

impl AppRegistry {
    /// Load apps and bindings from the store. Cursors always start fresh.
    pub async fn load(storage: Arc<dyn StorageAdapter>) -> Result<Self, RelayError> {
        let apps = storage.list_apps().await?;
        let mut bindings: HashMap<String, HashSet<Uuid>> = HashMap::new();
        for (connect_id, offer_id) in storage.list_app_offers().await? {
            bindings.entry(connect_id).or_default().insert(offer_id);
        }
        info!(apps = apps.len(), "app registry loaded");
        Ok(Self {
            storage,
            state: Mutex::new(RegistryState {
                apps,
                bindings,
                cursors: HashMap::new(),
            }),
            changed: Arc::new(Notify::new()),
        })
    }

    /// Rung whenever an app comes online or gains a binding.
    pub fn changes(&self) -> Arc<Notify> {
        Arc::clone(&self.changed)
    }

    /// Insert or refresh an app. A known app keeps its delivery count.
    pub async fn register(&self, app: ConnectedApp) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        self.storage.upsert_app(&app).await?;
        let online = app.is_online;
        match state.apps.iter_mut().find(|a| a.connect_id == app.connect_id) {
            Some(existing) => {
                existing.app_name = app.app_name;
                existing.is_online = app.is_online;
            }
            None => state.apps.push(app),
        }
        drop(state);
        if online {
            self.changed.notify_one();
        }
        Ok(())
    }

    pub async fn remove(&self, connect_id: &str) -> Result<bool, RelayError> {
        let mut state = self.state.lock().await;
        let removed = self.storage.delete_app(connect_id).await?;
        state.apps.retain(|a| a.connect_id != connect_id);
        state.bindings.remove(connect_id);
        Ok(removed)
    }

    /// Returns `false` for an unknown app.
    pub async fn set_online(&self, connect_id: &str, online: bool) -> Result<bool, RelayError> {
        let mut state = self.state.lock().await;
        let Some(app) = state.apps.iter_mut().find(|a| a.connect_id == connect_id) else {
            return Ok(false);
        };
        self.storage.set_app_online(connect_id, online).await?;
        app.is_online = online;
        drop(state);
        debug!(connect_id, online, "app presence changed");
        if online {
            self.changed.notify_one();
        }
        Ok(true)
    }

    pub async fn mark_all_offline(&self) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        self.storage.set_all_apps_offline().await?;
        for app in &mut state.apps {
            app.is_online = false;
        }
        Ok(())
    }

    pub async fn bind_offer(&self, connect_id: &str, offer_id: Uuid) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        if !state.apps.iter().any(|a| a.connect_id == connect_id) {
            return Err(RelayError::NotFound {
                entity: "app",
                id: connect_id.to_string(),
            });
        }
        self.storage.bind_app_offer(connect_id, offer_id).await?;
        state
            .bindings
            .entry(connect_id.to_string())
            .or_default()
            .insert(offer_id);
        drop(state);
        self.changed.notify_one();
        Ok(())
    }

    pub async fn unbind_offer(&self, connect_id: &str, offer_id: Uuid) -> Result<bool, RelayError> {
        let mut state = self.state.lock().await;
        let removed = self.storage.unbind_app_offer(connect_id, offer_id).await?;
        if let Some(set) = state.bindings.get_mut(connect_id) {
            set.remove(&offer_id);
        }
        Ok(removed)
    }

    pub async fn apps(&self) -> Vec<ConnectedApp> {
        self.state.lock().await.apps.clone()
    }

    pub async fn get(&self, connect_id: &str) -> Option<ConnectedApp> {
        self.state
            .lock()
            .await
            .apps
            .iter()
            .find(|a| a.connect_id == connect_id)
            .cloned()
    }

    /// Online apps eligible for `offer`, in registration order.
    ///
    /// With an offer, only apps bound to it qualify. Without one, any online
    /// app does.
    pub async fn online_targets(&self, offer: Option<&Offer>) -> Vec<ConnectedApp> {
        let state = self.state.lock().await;
        state
            .apps
            .iter()
            .filter(|a| a.is_online)
            .filter(|a| match offer {
                Some(offer) => state
                    .bindings
                    .get(&a.connect_id)
                    .is_some_and(|set| set.contains(&offer.id)),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Next target after the last one used for `key`.
    ///
    /// Returns the chosen index with the app. The cursor itself only moves in
    /// [`commit_delivery`](Self::commit_delivery), so a failed send is retried
    /// against the same app.
    pub async fn select_target(
        &self,
        key: &str,
        targets: &[ConnectedApp],
    ) -> Option<(usize, ConnectedApp)> {
        if targets.is_empty() {
            return None;
        }
        let state = self.state.lock().await;
        let index = state
            .cursors
            .get(key)
            .map_or(0, |last| (last + 1) % targets.len());
        Some((index, targets[index].clone()))
    }

    /// Record a successful delivery: cursor and `messages_sent` together.
    pub async fn commit_delivery(
        &self,
        connect_id: &str,
        key: &str,
        index: usize,
    ) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        self.storage.increment_messages_sent(connect_id).await?;
        state.cursors.insert(key.to_string(), index);
        if let Some(app) = state.apps.iter_mut().find(|a| a.connect_id == connect_id) {
            app.messages_sent += 1;
        }
        Ok(())
    }

    pub async fn cursor(&self, key: &str) -> Option<usize> {
        self.state.lock().await.cursors.get(key).copied()
    }

    /// Apply transport events until cancelled or the event stream closes.
    ///
    /// Losing the connection marks every app offline: presence is only
    /// known while the socket is up.
    pub async fn run_event_listener(
        self: Arc<Self>,
        mut events: broadcast::Receiver<TransportEvent>,
        mut connection: watch::Receiver<ConnectionState>,
        cancel: CancellationToken,
    ) {
        info!("app registry listening for transport events");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => self.apply_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "registry lagged behind transport events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *connection.borrow_and_update();
                    if matches!(state, ConnectionState::Disconnected | ConnectionState::Failed)
                        && let Err(e) = self.mark_all_offline().await
                    {
                        warn!(error = %e, "failed to mark apps offline");
                    }
                }
            }
        }
        debug!("app registry listener stopped");
    }

    async fn apply_event(&self, event: TransportEvent) {
        let result = match event {
            TransportEvent::AppConnected {
                connect_id,
                app_name,
            } => {
                info!(connect_id = %connect_id, app_name = %app_name, "app connected");
                let mut app = ConnectedApp::new(connect_id, app_name);
                app.is_online = true;
                self.register(app).await
            }
            TransportEvent::AppDisconnected { connect_id } => {
                info!(connect_id = %connect_id, "app disconnected");
                self.set_online(&connect_id, false).await.map(|_| ())
            }
            TransportEvent::Other { event, .. } => {
                debug!(event = %event, "ignoring transport event");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to apply transport event");
        }
    }
}
