// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the constraints serde cannot express: socket URL scheme, value
//! ranges, and non-empty names. All problems are collected before returning.

use crate::diagnostic::ConfigError;
use crate::model::PayrelayConfig;

/// Highest SIM slot index a handset reports.
const MAX_SIM_SLOT: i32 = 7;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Err` with every violation found (does not fail fast).
pub fn validate_config(config: &PayrelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path must not be empty"));
    }

    let url = config.socket.url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(ConfigError::invalid(format!(
            "socket.url `{url}` must start with ws:// or wss://"
        )));
    }

    if config.socket.send_event.trim().is_empty() {
        errors.push(ConfigError::invalid("socket.send_event must not be empty"));
    }

    if config.socket.connect_timeout_secs == 0 || config.socket.send_timeout_secs == 0 {
        errors.push(ConfigError::invalid(
            "socket timeouts must be at least one second",
        ));
    }

    if config.sms.dedup_capacity == 0 {
        errors.push(ConfigError::invalid("sms.dedup_capacity must be at least 1"));
    }

    if config.sms.max_message_length == 0 {
        errors.push(ConfigError::invalid(
            "sms.max_message_length must be at least 1",
        ));
    }

    if let Some(slot) = config.sms.sim_slot
        && !(0..=MAX_SIM_SLOT).contains(&slot)
    {
        errors.push(ConfigError::invalid(format!(
            "sms.sim_slot must be between 0 and {MAX_SIM_SLOT}, got {slot}"
        )));
    }

    for sender in config
        .sms
        .allowed_senders
        .iter()
        .chain(&config.sms.site_link_senders)
    {
        if sender.trim().is_empty() {
            errors.push(ConfigError::invalid("sender names must not be empty"));
            break;
        }
    }

    if config.dispatch.wake_interval_secs == 0 {
        errors.push(ConfigError::invalid(
            "dispatch.wake_interval_secs must be at least 1",
        ));
    }

    let rate = config.policy.commission_rate;
    if !(0.0..=1.0).contains(&rate) {
        errors.push(ConfigError::invalid(format!(
            "policy.commission_rate must be between 0 and 1, got {rate}"
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &PayrelayConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&PayrelayConfig::default()).is_ok());
    }

    #[test]
    fn http_url_is_rejected() {
        let mut config = PayrelayConfig::default();
        config.socket.url = "https://relay.example.com".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("socket.url")));
    }

    #[test]
    fn commission_rate_out_of_range() {
        let mut config = PayrelayConfig::default();
        config.policy.commission_rate = 1.5;
        assert!(messages(&config).iter().any(|m| m.contains("commission_rate")));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = PayrelayConfig::default();
        config.storage.database_path = " ".to_string();
        config.sms.sim_slot = Some(9);
        config.sms.dedup_capacity = 0;
        assert_eq!(messages(&config).len(), 3);
    }

    #[test]
    fn empty_sender_is_rejected() {
        let mut config = PayrelayConfig::default();
        config.sms.site_link_senders = vec!["".to_string()];
        assert!(messages(&config).iter().any(|m| m.contains("sender")));
    }
}
