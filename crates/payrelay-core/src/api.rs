// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response envelope of the account/subscription REST API.
//!
//! The REST flows themselves live outside this workspace; only the envelope
//! and the rule for turning a failed response into a user-facing message are
//! shared here.

use serde::{Deserialize, Serialize};

/// Shown when an error body is absent or cannot be understood.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// `{success, msg, data}` envelope returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

/// Derive a short human-readable message from an error response body.
pub fn user_facing_message(body: Option<&str>) -> String {
    body.and_then(|b| serde_json::from_str::<ApiResponse<serde_json::Value>>(b).ok())
        .and_then(|r| r.msg)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}
