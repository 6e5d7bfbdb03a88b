// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use payrelay_core::now_millis;
use payrelay_core::types::{PaymentDetails, SmsMessage};

use super::MessageExtractor;
use crate::classifier::SITE_LINK_PREFIX;
use crate::error::ExtractionError;

/// Colon-delimited `BHSL<sender>:<amount>:<code> <rest>` confirmations.
///
/// Unlike the other formats, a missing payment code is a hard failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct SiteLinkExtractor;

impl MessageExtractor for SiteLinkExtractor {
    fn extract_details(&self, text: &str) -> Result<SmsMessage, ExtractionError> {
        let mut fields = text.split(':');

        let sender = fields
            .next()
            .unwrap_or_default()
            .trim_start()
            .trim_start_matches(SITE_LINK_PREFIX)
            .trim()
            .to_string();
        let amount = fields
            .next()
            .and_then(|f| f.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let code = fields
            .next()
            .and_then(|f| f.split_whitespace().next())
            .ok_or(ExtractionError::InvalidPaymentCode)?;

        Ok(SmsMessage::SiteLinkPayment(PaymentDetails {
            sender_name: sender.clone(),
            sender_phone: sender,
            amount,
            message: text.to_string(),
            time: now_millis(),
            payment_code: Some(code.to_string()),
        }))
    }
}
