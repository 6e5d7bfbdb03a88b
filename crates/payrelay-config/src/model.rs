// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Payrelay forwarding service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Payrelay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PayrelayConfig {
    /// Agent identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Socket connection to the client apps.
    #[serde(default)]
    pub socket: SocketConfig,

    /// SMS intake and validation settings.
    #[serde(default)]
    pub sms: SmsConfig,

    /// Delivery dispatcher timing.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Retry ceiling and commission policy.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Agent identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Id of the logged-in agent. Required to open the socket connection.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Display name of this relay instance.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "payrelay".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("payrelay").join("payrelay.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("payrelay.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Socket transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SocketConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    #[serde(default = "default_socket_url")]
    pub url: String,

    /// Connect id of this relay. Required to open the socket connection.
    #[serde(default)]
    pub connect_id: Option<String>,

    /// Event name used when forwarding a message to an app.
    #[serde(default = "default_send_event")]
    pub send_event: String,

    /// Timeout for the WebSocket handshake, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout for a single send, in seconds.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Reconnect attempts after a dropped connection before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            url: default_socket_url(),
            connect_id: None,
            send_event: default_send_event(),
            connect_timeout_secs: default_connect_timeout_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl SocketConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

fn default_socket_url() -> String {
    "ws://127.0.0.1:3000/socket".to_string()
}

fn default_send_event() -> String {
    "forward_message".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

/// SMS intake and validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    /// Sender addresses accepted for payment confirmations. Empty accepts any sender.
    #[serde(default = "default_allowed_senders")]
    pub allowed_senders: Vec<String>,

    /// Additional senders accepted for site-linked (`BHSL`) confirmations.
    #[serde(default)]
    pub site_link_senders: Vec<String>,

    /// Only accept messages received on this SIM slot, when set.
    #[serde(default)]
    pub sim_slot: Option<i32>,

    /// Number of recent messages remembered for duplicate rejection.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Longest accepted message body, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            allowed_senders: default_allowed_senders(),
            site_link_senders: Vec::new(),
            sim_slot: None,
            dedup_capacity: default_dedup_capacity(),
            max_message_length: default_max_message_length(),
        }
    }
}

fn default_allowed_senders() -> Vec<String> {
    vec!["MPESA".to_string()]
}

fn default_dedup_capacity() -> usize {
    256
}

fn default_max_message_length() -> usize {
    1600
}

/// Delivery dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Wait before re-checking when no online app can take the head transaction.
    #[serde(default = "default_stall_backoff_ms")]
    pub stall_backoff_ms: u64,

    /// Wait before retrying after a failed send.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Periodic wake-up of an idle dispatcher, in seconds.
    #[serde(default = "default_wake_interval_secs")]
    pub wake_interval_secs: u64,

    /// Forward transactions with no matched offer to any online app.
    /// When off they stay queued for an operator.
    #[serde(default)]
    pub forward_unmatched: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            stall_backoff_ms: default_stall_backoff_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            wake_interval_secs: default_wake_interval_secs(),
            forward_unmatched: false,
        }
    }
}

impl DispatchConfig {
    pub fn stall_backoff(&self) -> Duration {
        Duration::from_millis(self.stall_backoff_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn wake_interval(&self) -> Duration {
        Duration::from_secs(self.wake_interval_secs)
    }
}

fn default_stall_backoff_ms() -> u64 {
    1500
}

fn default_retry_backoff_ms() -> u64 {
    2500
}

fn default_wake_interval_secs() -> u64 {
    30
}

/// Retry ceiling and commission policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Manual retries allowed per transaction.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fraction of each delivered amount credited as agent commission.
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            commission_rate: default_commission_rate(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_commission_rate() -> f64 {
    0.05
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PayrelayConfig::default();
        assert_eq!(config.agent.name, "payrelay");
        assert_eq!(config.socket.send_event, "forward_message");
        assert_eq!(config.sms.allowed_senders, vec!["MPESA"]);
        assert_eq!(config.dispatch.stall_backoff(), Duration::from_millis(1500));
        assert_eq!(config.dispatch.retry_backoff(), Duration::from_millis(2500));
        assert!(!config.dispatch.forward_unmatched);
        assert_eq!(config.policy.max_retries, 3);
        assert!(config.storage.database_path.ends_with("payrelay.db"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: PayrelayConfig = toml::from_str(
            r#"
[dispatch]
retry_backoff_ms = 100
"#,
        )
        .unwrap();
        assert_eq!(config.dispatch.retry_backoff_ms, 100);
        assert_eq!(config.dispatch.stall_backoff_ms, 1500);
        assert_eq!(config.socket.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn sms_section_deny_unknown_fields() {
        let result = toml::from_str::<PayrelayConfig>(
            r#"
[sms]
allowed_sender = ["MPESA"]
"#,
        );
        assert!(result.is_err());
    }
}
