// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./payrelay.toml` > `~/.config/payrelay/payrelay.toml` >
//! `/etc/payrelay/payrelay.toml` with environment variable overrides via `PAYRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PayrelayConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/payrelay/payrelay.toml` (system-wide)
/// 3. `~/.config/payrelay/payrelay.toml` (user XDG config)
/// 4. `./payrelay.toml` (local directory)
/// 5. `PAYRELAY_*` environment variables
pub fn load_config() -> Result<PayrelayConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<PayrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PayrelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PayrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PayrelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PayrelayConfig::default()))
        .merge(Toml::file("/etc/payrelay/payrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("payrelay/payrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("payrelay.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `PAYRELAY_SOCKET_CONNECT_ID` must map to `socket.connect_id`,
/// not `socket.connect.id`.
fn env_provider() -> Env {
    Env::prefixed("PAYRELAY_").map(|key| {
        let key_str = key.as_str();
        let mapped = ["agent", "storage", "socket", "sms", "dispatch", "policy"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn env_var_overrides_nested_key() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PAYRELAY_SOCKET_CONNECT_ID", "relay-9");
            jail.set_env("PAYRELAY_POLICY_MAX_RETRIES", "5");
            let config = load_config()?;
            assert_eq!(config.socket.connect_id.as_deref(), Some("relay-9"));
            assert_eq!(config.policy.max_retries, 5);
            Ok(())
        });
    }

    #[test]
    #[serial_test::serial]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "payrelay.toml",
                r#"
[agent]
user_id = "agent-1"
"#,
            )?;
            let config = load_config()?;
            assert_eq!(config.agent.user_id.as_deref(), Some("agent-1"));
            Ok(())
        });
    }
}
