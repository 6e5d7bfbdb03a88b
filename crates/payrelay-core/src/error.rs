// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Payrelay forwarding service.

use thiserror::Error;

/// The primary error type used across all Payrelay adapter traits and core operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Socket transport errors (connection failure, send failure, closed channel).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication parameters are missing. The message is shown to the user as-is.
    #[error("{0}")]
    AuthRequired(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A manual retry was requested for a transaction that already used its retries.
    #[error("transaction {id} reached the retry limit ({retries}/{max})")]
    RetryLimitExceeded { id: String, retries: u32, max: u32 },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        RelayError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Whether the failure is worth retrying with backoff.
    ///
    /// Transport, storage and timeout failures are transient; everything else
    /// is a terminal condition for the current operation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RelayError::Transport { .. } | RelayError::Storage { .. } | RelayError::Timeout { .. }
        )
    }
}
