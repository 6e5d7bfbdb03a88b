// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the intake pipeline, the store and the dispatcher.
//!
//! Times are epoch milliseconds throughout; amounts are whole currency units.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
}

// --- SMS intake ---

/// A complete inbound text message as handed over by the SMS intake path.
///
/// Ephemeral: consumed once by the pipeline and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSmsMessage {
    pub message: String,
    pub sender: String,
    pub sim_slot: Option<i32>,
    pub timestamp: EpochMillis,
}

/// Fields extracted from a payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub sender_name: String,
    pub sender_phone: String,
    pub amount: i64,
    /// The free text the fields were extracted from.
    pub message: String,
    pub time: EpochMillis,
    /// Payment reference code. Always present for site-linked payments.
    pub payment_code: Option<String>,
}

/// A structured payment confirmation produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmsMessage {
    StandardPayment(PaymentDetails),
    TillPayment(PaymentDetails),
    SiteLinkPayment(PaymentDetails),
}

impl SmsMessage {
    pub fn details(&self) -> &PaymentDetails {
        match self {
            SmsMessage::StandardPayment(d)
            | SmsMessage::TillPayment(d)
            | SmsMessage::SiteLinkPayment(d) => d,
        }
    }

    pub fn sender_name(&self) -> &str {
        &self.details().sender_name
    }

    pub fn sender_phone(&self) -> &str {
        &self.details().sender_phone
    }

    pub fn amount(&self) -> i64 {
        self.details().amount
    }

    pub fn message(&self) -> &str {
        &self.details().message
    }

    pub fn time(&self) -> EpochMillis {
        self.details().time
    }

    pub fn payment_code(&self) -> Option<&str> {
        self.details().payment_code.as_deref()
    }

    pub fn is_site_linked(&self) -> bool {
        matches!(self, SmsMessage::SiteLinkPayment(_))
    }

    /// The transaction type recorded for this payment.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            SmsMessage::StandardPayment(_) => TransactionType::Standard,
            SmsMessage::TillPayment(_) => TransactionType::Till,
            SmsMessage::SiteLinkPayment(_) => TransactionType::SiteLink,
        }
    }
}

// --- Offers ---

/// Bundle category of an offer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferType {
    Data,
    Voice,
    Sms,
    None,
}

/// Optional validity tag shown alongside an offer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferTag {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    NoExpiry,
}

/// A purchasable bundle. `price` is the join key for payment matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub name: String,
    pub ussd_code: String,
    pub price: i64,
    pub offer_type: OfferType,
    pub tag: Option<OfferTag>,
    pub is_site_linked: bool,
}

impl Offer {
    pub fn new(name: impl Into<String>, ussd_code: impl Into<String>, price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            ussd_code: ussd_code.into(),
            price,
            offer_type: OfferType::Data,
            tag: None,
            is_site_linked: false,
        }
    }
}

// --- Customers ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub account_balance: i64,
    pub last_purchase_time: EpochMillis,
}

impl Customer {
    /// A customer identified by phone, with no balance yet.
    pub fn new(name: impl Into<String>, phone: impl Into<String>, last_purchase_time: EpochMillis) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            phone: phone.into(),
            account_balance: 0,
            last_purchase_time,
        }
    }
}

// --- Transactions ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Processing,
    Scheduled,
    Rescheduled,
    Success,
    Failed,
    Unmatched,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Standard,
    Till,
    SiteLink,
}

/// How a transaction came to be rescheduled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RescheduleMode {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleInfo {
    pub parent_transaction_id: Uuid,
    pub time: EpochMillis,
    pub mode: RescheduleMode,
}

/// A received payment awaiting delivery to a connected app.
///
/// Queue ordering key is `time`, oldest first. A transaction without an
/// offer always carries [`TransactionStatus::Unmatched`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub amount: i64,
    pub time: EpochMillis,
    /// The confirmation text; this is the payload forwarded to apps.
    pub mpesa_message: String,
    pub response_message: String,
    pub status: TransactionStatus,
    pub customer: Customer,
    pub offer: Option<Offer>,
    pub transaction_type: TransactionType,
    pub retries: u32,
    pub created_at: EpochMillis,
    pub reschedule_info: Option<RescheduleInfo>,
    /// Payment reference code, when the confirmation carried one.
    #[serde(alias = "mpesa_code")]
    pub payment_code: Option<String>,
}

impl Transaction {
    /// Build a transaction for an extracted payment.
    ///
    /// Status is `Scheduled` when an offer matched and `Unmatched` otherwise.
    pub fn from_payment(sms: &SmsMessage, customer: Customer, offer: Option<Offer>) -> Self {
        let status = if offer.is_some() {
            TransactionStatus::Scheduled
        } else {
            TransactionStatus::Unmatched
        };
        Self {
            id: Uuid::new_v4(),
            amount: sms.amount(),
            time: sms.time(),
            mpesa_message: sms.message().to_string(),
            response_message: String::new(),
            status,
            customer,
            offer,
            transaction_type: sms.transaction_type(),
            retries: 0,
            created_at: now_millis(),
            reschedule_info: None,
            payment_code: sms.payment_code().map(str::to_string),
        }
    }

    /// Round-robin cursor key: the offer id, or the empty key for offer-less items.
    pub fn cursor_key(&self) -> String {
        self.offer
            .as_ref()
            .map(|o| o.id.to_string())
            .unwrap_or_default()
    }

    /// Checks the offer/status invariant.
    pub fn is_consistent(&self) -> bool {
        self.offer.is_some() || self.status == TransactionStatus::Unmatched
    }
}

// --- Connected apps ---

/// A downstream client application that receives forwarded messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedApp {
    pub connect_id: String,
    pub app_name: String,
    pub is_online: bool,
    pub messages_sent: u64,
}

impl ConnectedApp {
    pub fn new(connect_id: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            connect_id: connect_id.into(),
            app_name: app_name.into(),
            is_online: false,
            messages_sent: 0,
        }
    }
}

/// Commission accumulated on one calendar date (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCommission {
    pub date: String,
    pub amount: f64,
}

// --- Socket transport ---

/// Credentials presented when opening the socket connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub user_id: String,
    pub connect_id: String,
}

/// Observable state of the socket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Reconnection attempts are exhausted; the transport will not recover on its own.
    Failed,
}

/// Events received from the socket server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    AppConnected { connect_id: String, app_name: String },
    AppDisconnected { connect_id: String },
    /// Any other named event, with its raw JSON data.
    Other { event: String, data: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn payment(amount: i64) -> SmsMessage {
        SmsMessage::StandardPayment(PaymentDetails {
            sender_name: "John Doe".into(),
            sender_phone: "0712345678".into(),
            amount,
            message: "received".into(),
            time: 1_000,
            payment_code: Some("QWE123XR".into()),
        })
    }

    #[test]
    fn unmatched_payment_has_unmatched_status() {
        let sms = payment(37);
        let tx = Transaction::from_payment(&sms, Customer::new("John Doe", "0712345678", 1_000), None);
        assert_eq!(tx.status, TransactionStatus::Unmatched);
        assert!(tx.offer.is_none());
        assert!(tx.is_consistent());
        assert_eq!(tx.cursor_key(), "");
    }

    #[test]
    fn matched_payment_is_scheduled() {
        let sms = payment(50);
        let offer = Offer::new("1GB", "*544*1#", 50);
        let key = offer.id.to_string();
        let tx = Transaction::from_payment(&sms, Customer::new("John Doe", "0712345678", 1_000), Some(offer));
        assert_eq!(tx.status, TransactionStatus::Scheduled);
        assert_eq!(tx.amount, 50);
        assert_eq!(tx.time, 1_000);
        assert_eq!(tx.payment_code.as_deref(), Some("QWE123XR"));
        assert_eq!(tx.cursor_key(), key);
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            TransactionStatus::Processing,
            TransactionStatus::Scheduled,
            TransactionStatus::Rescheduled,
            TransactionStatus::Success,
            TransactionStatus::Failed,
            TransactionStatus::Unmatched,
        ] {
            let s = status.to_string();
            assert_eq!(TransactionStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(TransactionStatus::Unmatched.to_string(), "UNMATCHED");
    }

    #[test]
    fn offer_type_parses_case_insensitively() {
        assert_eq!(OfferType::from_str("data").unwrap(), OfferType::Data);
        assert_eq!(OfferTag::from_str("no_expiry").unwrap(), OfferTag::NoExpiry);
    }

    #[test]
    fn transaction_type_follows_variant() {
        let d = payment(10).details().clone();
        assert_eq!(SmsMessage::TillPayment(d.clone()).transaction_type(), TransactionType::Till);
        assert_eq!(SmsMessage::SiteLinkPayment(d).transaction_type(), TransactionType::SiteLink);
    }
}
