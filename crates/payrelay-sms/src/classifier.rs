// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message kind classification from raw confirmation text.
//!
//! Rules are checked in a fixed priority order, so a message that would
//! match more than one pattern always lands in the first.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ClassifyError;

/// Literal prefix of site-linked confirmations.
pub const SITE_LINK_PREFIX: &str = "BHSL";

static TILL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)received from [0-9]{9,12}").unwrap());

static STANDARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)received Ksh[0-9]+(\.[0-9]{2})?").unwrap());

pub(crate) static RECOMMENDATION_TIMEOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Recommendation for ([0-9]{9,12}) timed out").unwrap());

/// What kind of confirmation a message is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    SiteLink,
    Till,
    StandardPayment,
    /// Carries the phone number the lapsed recommendation was for.
    RecommendationTimeout(String),
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::SiteLink => write!(f, "site_link"),
            MessageKind::Till => write!(f, "till"),
            MessageKind::StandardPayment => write!(f, "standard"),
            MessageKind::RecommendationTimeout(_) => write!(f, "recommendation_timeout"),
        }
    }
}

/// Classify `text`.
pub fn classify(text: &str) -> Result<MessageKind, ClassifyError> {
    if text.starts_with(SITE_LINK_PREFIX) {
        return Ok(MessageKind::SiteLink);
    }
    if TILL.is_match(text) {
        return Ok(MessageKind::Till);
    }
    if STANDARD.is_match(text) {
        return Ok(MessageKind::StandardPayment);
    }
    if let Some(caps) = RECOMMENDATION_TIMEOUT.captures(text) {
        return Ok(MessageKind::RecommendationTimeout(caps[1].to_string()));
    }
    Err(ClassifyError::UnknownMessageKind)
}
