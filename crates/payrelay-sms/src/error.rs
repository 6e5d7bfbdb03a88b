// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message rejection errors raised by the SMS pipeline stages.
//!
//! None of these are retryable: the SMS is the only copy of the input, so a
//! rejected message is logged and dropped.

use thiserror::Error;

/// No classification rule matched the message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("message matches no known payment format")]
    UnknownMessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// A field that has no sensible default could not be parsed.
    #[error("required field `{0}` could not be extracted")]
    MissingField(&'static str),

    /// A site-linked confirmation without a payment reference code.
    #[error("site-link message carries no payment code")]
    InvalidPaymentCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is empty or malformed")]
    InvalidMessageFormat,

    /// Not a payment at all: the operator's offer recommendation lapsed.
    #[error("recommendation for {0} timed out")]
    RecommendationTimedOut(String),

    #[error("sender is not authorized")]
    UnauthorizedSender,

    #[error("message was already processed")]
    DuplicateMessage,
}

/// A fragment that is not a decodable SMS-DELIVER PDU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PduError {
    #[error("PDU truncated while reading {0}")]
    Truncated(&'static str),

    #[error("unsupported message type indicator {0:#04x}")]
    UnsupportedMessageType(u8),

    #[error("unsupported data coding scheme {0:#04x}")]
    UnsupportedCoding(u8),

    #[error("invalid service centre timestamp")]
    InvalidTimestamp,

    #[error("invalid UCS-2 payload")]
    InvalidUcs2,

    #[error("invalid hex in PDU: {0}")]
    InvalidHex(String),
}
