// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON event frames exchanged with the socket server.
//!
//! Every frame is `{"event": <name>, "data": {...}}` in both directions.
//!
//! Client -> Server:
//! ```json
//! {"event": "forward_message", "data": {"to": "till-1", "message": "QAB1234567 Confirmed. ..."}}
//! ```
//!
//! Server -> Client:
//! ```json
//! {"event": "app_connected", "data": {"connect_id": "till-1", "app_name": "Till"}}
//! {"event": "app_disconnected", "data": {"connect_id": "till-1"}}
//! ```

use payrelay_core::types::TransportEvent;
use serde::{Deserialize, Serialize};

pub const APP_CONNECTED: &str = "app_connected";
pub const APP_DISCONNECTED: &str = "app_disconnected";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ForwardData<'a> {
    to: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConnectedData {
    connect_id: String,
    #[serde(default)]
    app_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisconnectedData {
    connect_id: String,
}

/// Encode a forward request for `connect_id`.
pub fn forward_frame(event: &str, connect_id: &str, message: &str) -> String {
    serde_json::json!({
        "event": event,
        "data": ForwardData { to: connect_id, message },
    })
    .to_string()
}

/// Decode a server frame. Returns `None` for text that is not a frame, or a
/// presence event missing its `connect_id`.
pub fn parse_event(text: &str) -> Option<TransportEvent> {
    let frame: Frame = serde_json::from_str(text).ok()?;
    match frame.event.as_str() {
        APP_CONNECTED => {
            let data: ConnectedData = serde_json::from_value(frame.data).ok()?;
            let app_name = data.app_name.unwrap_or_else(|| data.connect_id.clone());
            Some(TransportEvent::AppConnected {
                connect_id: data.connect_id,
                app_name,
            })
        }
        APP_DISCONNECTED => {
            let data: DisconnectedData = serde_json::from_value(frame.data).ok()?;
            Some(TransportEvent::AppDisconnected {
                connect_id: data.connect_id,
            })
        }
        _ => Some(TransportEvent::Other {
            event: frame.event,
            data: frame.data.to_string(),
        }),
    }
}
