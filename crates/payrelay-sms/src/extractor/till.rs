// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::LazyLock;

use payrelay_core::now_millis;
use payrelay_core::types::{PaymentDetails, SmsMessage};
use regex::Regex;

use super::{MessageExtractor, UNKNOWN, parse_amount, parse_payment_code, parse_time};
use crate::error::ExtractionError;

static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{12}").unwrap());

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"from [0-9]{12} (.+?)\. New").unwrap());

/// Till confirmations carry the payer as a 12-digit international number.
#[derive(Debug, Default, Clone, Copy)]
pub struct TillExtractor;

/// `254712345678` becomes `0712345678`.
fn local_phone(international: &str) -> String {
    let mut tail: Vec<char> = international.chars().rev().take(9).collect();
    tail.reverse();
    format!("0{}", tail.into_iter().collect::<String>())
}

impl MessageExtractor for TillExtractor {
    fn extract_details(&self, text: &str) -> Result<SmsMessage, ExtractionError> {
        let sender_phone = PHONE
            .find(text)
            .map_or_else(|| UNKNOWN.to_string(), |m| local_phone(m.as_str()));
        let sender_name = NAME
            .captures(text)
            .map_or_else(|| UNKNOWN.to_string(), |caps| caps[1].trim().to_string());

        Ok(SmsMessage::TillPayment(PaymentDetails {
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

    #[test]
    fn extracts_till_confirmation() {
        let text = "QAB1234567 Confirmed. Ksh2,250.00 received from 254712345678 JANE W DOE. New Account balance is Ksh10,000.00. on 1/2/25 at 9:05 AM";
        let sms = TillExtractor.extract_details(text).unwrap();
        assert!(matches!(sms, SmsMessage::TillPayment(_)));
        assert_eq!(sms.sender_phone(), "0712345678");
        assert_eq!(sms.sender_name(), "JANE W DOE");
        assert_eq!(sms.amount(), 2250);
        assert_eq!(sms.payment_code(), Some("QAB1234567"));
    }

    #[test]
    fn local_phone_keeps_last_nine_digits() {
        assert_eq!(local_phone("254700000001"), "0700000001");
    }

    #[test]
    fn local_phone_counts_chars_not_bytes() {
        assert_eq!(local_phone("𝟐𝟓𝟒𝟕𝟏𝟐𝟑𝟒𝟓𝟔𝟕𝟖"), "0𝟕𝟏𝟐𝟑𝟒𝟓𝟔𝟕𝟖");
    }

    #[test]
    fn non_ascii_digits_are_not_a_phone() {
        let text = "QAB1234567 Confirmed. Ksh2,250.00 received from 𝟐𝟓𝟒𝟕𝟏𝟐𝟑𝟒𝟓𝟔𝟕𝟖 JANE W DOE. New Account balance is Ksh10,000.00.";
        let sms = TillExtractor.extract_details(text).unwrap();
        assert_eq!(sms.sender_phone(), UNKNOWN);
        assert_eq!(sms.sender_name(), UNKNOWN);
    }

    #[test]
    fn missing_name_defaults() {
        let sms = TillExtractor
            .extract_details("Ksh10.00 received from 254712345678")
            .unwrap();
        assert_eq!(sms.sender_name(), UNKNOWN);
        assert_eq!(sms.sender_phone(), "0712345678");
    }
}
