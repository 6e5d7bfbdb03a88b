// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field extraction from classified confirmation texts.
//!
//! Each payment kind has its own [`MessageExtractor`]. Standard and till
//! extraction is best-effort per field: an unparsable name or time falls back
//! to a default. The [`Extractors`] table then rejects records whose amount
//! or phone fell back, since those cannot be delivered or attributed.

mod site_link;
mod standard;
mod till;

use std::sync::LazyLock;

use chrono::{Local, NaiveDateTime, TimeZone};
use payrelay_core::types::{EpochMillis, SmsMessage};
use regex::Regex;

use crate::classifier::MessageKind;
use crate::error::ExtractionError;

pub use site_link::SiteLinkExtractor;
pub use standard::StandardExtractor;
pub use till::TillExtractor;

/// Placeholder for a name or phone that could not be parsed.
pub const UNKNOWN: &str = "Unknown";

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Ksh([0-9,]+\.[0-9]{2})").unwrap());

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"on ([0-9]{1,2}/[0-9]{1,2}/[0-9]{2,4} at [0-9]{1,2}:[0-9]{2} [AP]M)").unwrap()
});

static PAYMENT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z0-9]{10})\s+Confirmed").unwrap());

/// Turns the text of one message kind into an [`SmsMessage`].
pub trait MessageExtractor: Send + Sync {
    fn extract_details(&self, text: &str) -> Result<SmsMessage, ExtractionError>;
}

/// `Ksh1,500.00` becomes 1500. Fractions are truncated, never rounded.
pub(crate) fn parse_amount(text: &str) -> i64 {
    AMOUNT
        .captures(text)
        .and_then(|caps| {
            let digits = caps[1].replace(',', "");
            digits.split('.').next().and_then(|whole| whole.parse().ok())
        })
        .unwrap_or(0)
}

/// Message-embedded `d/m/yy at h:mm AM` in local time, or `now` when absent.
pub(crate) fn parse_time(text: &str, now: EpochMillis) -> EpochMillis {
    let Some(caps) = TIME.captures(text) else {
        return now;
    };
    let stamp = &caps[1];
    let year_digits = stamp
        .split(" at ")
        .next()
        .and_then(|date| date.rsplit('/').next())
        .map_or(2, str::len);
    let format = if year_digits == 4 {
        "%d/%m/%Y at %I:%M %p"
    } else {
        "%d/%m/%y at %I:%M %p"
    };
    NaiveDateTime::parse_from_str(stamp, format)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map_or(now, |dt| dt.timestamp_millis())
}

/// The ten-character reference that opens most confirmations.
pub(crate) fn parse_payment_code(text: &str) -> Option<String> {
    PAYMENT_CODE
        .captures(text.trim_start())
        .map(|caps| caps[1].to_string())
}

/// Extractor per payment kind, built once at startup.
pub struct Extractors {
    standard: Box<dyn MessageExtractor>,
    till: Box<dyn MessageExtractor>,
    site_link: Box<dyn MessageExtractor>,
}

impl Default for Extractors {
    fn default() -> Self {
        Self {
            standard: Box::new(StandardExtractor),
            till: Box::new(TillExtractor),
            site_link: Box::new(SiteLinkExtractor),
        }
    }
}

impl Extractors {
    pub fn new(
        standard: Box<dyn MessageExtractor>,
        till: Box<dyn MessageExtractor>,
        site_link: Box<dyn MessageExtractor>,
    ) -> Self {
        Self {
            standard,
            till,
            site_link,
        }
    }

    /// `None` for recommendation timeouts, which are not payments.
    pub fn for_kind(&self, kind: &MessageKind) -> Option<&dyn MessageExtractor> {
        match kind {
            MessageKind::StandardPayment => Some(self.standard.as_ref()),
            MessageKind::Till => Some(self.till.as_ref()),
            MessageKind::SiteLink => Some(self.site_link.as_ref()),
            MessageKind::RecommendationTimeout(_) => None,
        }
    }

    /// Extract and check the fields a transaction cannot do without.
    pub fn extract(&self, kind: &MessageKind, text: &str) -> Result<SmsMessage, ExtractionError> {
        let extractor = self
            .for_kind(kind)
            .ok_or(ExtractionError::MissingField("payment"))?;
        let sms = extractor.extract_details(text)?;
        if sms.amount() <= 0 {
            return Err(ExtractionError::MissingField("amount"));
        }
        if sms.sender_phone().is_empty() || sms.sender_phone() == UNKNOWN {
            return Err(ExtractionError::MissingField("sender_phone"));
        }
        Ok(sms)
    }
}
