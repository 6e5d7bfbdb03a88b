// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::LazyLock;

use payrelay_core::now_millis;
use payrelay_core::types::{PaymentDetails, SmsMessage};
use regex::Regex;

use super::{MessageExtractor, UNKNOWN, parse_amount, parse_payment_code, parse_time};
use crate::error::ExtractionError;

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"from (.+?) ([0-9]{10})").unwrap());

static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{10}").unwrap());

/// "... received Ksh1,500.00 from JOHN DOE 0712345678 on 5/6/24 at 2:30 PM".
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardExtractor;

impl MessageExtractor for StandardExtractor {
    fn extract_details(&self, text: &str) -> Result<SmsMessage, ExtractionError> {
        let sender_name = NAME
            .captures(text)
            .map_or_else(|| UNKNOWN.to_string(), |caps| caps[1].trim().to_string());
        let sender_phone = PHONE
            .find(text)
            .map_or_else(|| UNKNOWN.to_string(), |m| m.as_str().to_string());

        Ok(SmsMessage::StandardPayment(PaymentDetails {
            sender_name,
            sender_phone,
            amount: parse_amount(text),
            message: text.to_string(),
            time: parse_time(text, now_millis()),
            payment_code: parse_payment_code(text),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    #[test]
    fn extracts_documented_example() {
        let text = "QAB1234567 Confirmed. You have received Ksh1,500.00 from John Doe 0712345678 on 5/6/24 at 2:30 PM";
        let sms = StandardExtractor.extract_details(text).unwrap();
        let d = sms.details();
        assert_eq!(d.sender_name, "John Doe");
        assert_eq!(d.sender_phone, "0712345678");
        assert_eq!(d.amount, 1500);
        assert_eq!(d.payment_code.as_deref(), Some("QAB1234567"));
        let expected = Local.with_ymd_and_hms(2024, 6, 5, 14, 30, 0).earliest().unwrap();
        assert_eq!(d.time, expected.timestamp_millis());
        assert!(matches!(sms, SmsMessage::StandardPayment(_)));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let sms = StandardExtractor.extract_details("received Ksh20.00").unwrap();
        assert_eq!(sms.sender_name(), UNKNOWN);
        assert_eq!(sms.sender_phone(), UNKNOWN);
        assert_eq!(sms.amount(), 20);
        assert!(sms.payment_code().is_none());
    }
}
