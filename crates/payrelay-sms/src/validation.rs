// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Policy checks applied to an inbound message before extraction.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use payrelay_config::model::SmsConfig;
use tracing::debug;

use crate::classifier::{RECOMMENDATION_TIMEOUT, SITE_LINK_PREFIX};
use crate::error::ValidationError;

/// Rejects malformed, unauthorized and repeated messages.
///
/// Holds a bounded memory of recently accepted `(sender, text)` pairs; the
/// oldest entry is evicted once `dedup_capacity` is reached.
#[derive(Debug)]
pub struct Validator {
    allowed_senders: Vec<String>,
    site_link_senders: Vec<String>,
    sim_slot: Option<i32>,
    max_message_length: usize,
    capacity: usize,
    recent: Mutex<VecDeque<(String, String)>>,
}

impl Validator {
    pub fn new(config: &SmsConfig) -> Self {
        Self {
            allowed_senders: config.allowed_senders.clone(),
            site_link_senders: config.site_link_senders.clone(),
            sim_slot: config.sim_slot,
            max_message_length: config.max_message_length,
            capacity: config.dedup_capacity.max(1),
            recent: Mutex::new(VecDeque::with_capacity(config.dedup_capacity.max(1))),
        }
    }

    /// Check one message and remember it for duplicate detection.
    pub fn validate(
        &self,
        message: &str,
        sender: &str,
        sim_slot: Option<i32>,
    ) -> Result<(), ValidationError> {
        self.check(message, sender, sim_slot)?;
        self.remember(message, sender);
        Ok(())
    }

    /// Run every check without recording the message. Callers that persist
    /// the message call [`remember`](Self::remember) once the write is done,
    /// so a delivery that failed to persist can be retried.
    pub fn check(
        &self,
        message: &str,
        sender: &str,
        sim_slot: Option<i32>,
    ) -> Result<(), ValidationError> {
        let text = message.trim();
        if text.is_empty() || text.chars().count() > self.max_message_length {
            return Err(ValidationError::InvalidMessageFormat);
        }

        if let Some(caps) = RECOMMENDATION_TIMEOUT.captures(text) {
            return Err(ValidationError::RecommendationTimedOut(caps[1].to_string()));
        }

        if !self.sender_allowed(text, sender) {
            debug!(sender, "sender not in allow-list");
            return Err(ValidationError::UnauthorizedSender);
        }
        if let Some(expected) = self.sim_slot
            && sim_slot != Some(expected)
        {
            debug!(expected, actual = ?sim_slot, "message from unexpected SIM slot");
            return Err(ValidationError::UnauthorizedSender);
        }

        let recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.iter().any(|(s, m)| s == sender && m == text) {
            return Err(ValidationError::DuplicateMessage);
        }
        Ok(())
    }

    /// Record an accepted message. The oldest entry is evicted at capacity.
    pub fn remember(&self, message: &str, sender: &str) {
        let text = message.trim();
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.iter().any(|(s, m)| s == sender && m == text) {
            return;
        }
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back((sender.to_string(), text.to_string()));
    }

    fn sender_allowed(&self, text: &str, sender: &str) -> bool {
        if self.allowed_senders.is_empty() {
            return true;
        }
        let matches = |list: &[String]| list.iter().any(|s| s.eq_ignore_ascii_case(sender));
        matches(&self.allowed_senders)
            || (text.starts_with(SITE_LINK_PREFIX) && matches(&self.site_link_senders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PAYMENT: &str =
        "QAB1234567 Confirmed. You have received Ksh1,500.00 from JOHN DOE 0712345678";

    fn validator() -> Validator {
        Validator::new(&SmsConfig {
            site_link_senders: vec!["+254748484118".into()],
            ..SmsConfig::default()
        })
    }

    #[test]
    fn accepts_allowed_sender() {
        assert_eq!(validator().validate(PAYMENT, "MPESA", None), Ok(()));
    }

    #[test]
    fn sender_match_ignores_case() {
        assert_eq!(validator().validate(PAYMENT, "mpesa", None), Ok(()));
    }

    #[test]
    fn blank_and_oversized_are_malformed() {
        let v = validator();
        assert_eq!(v.validate("   ", "MPESA", None), Err(ValidationError::InvalidMessageFormat));
        let long = "x".repeat(SmsConfig::default().max_message_length + 1);
        assert_eq!(v.validate(&long, "MPESA", None), Err(ValidationError::InvalidMessageFormat));
    }

    #[test]
    fn recommendation_timeout_short_circuits() {
        let err = validator()
            .validate("Recommendation for 0712345678 timed out", "STRANGER", None)
            .unwrap_err();
        assert_eq!(err, ValidationError::RecommendationTimedOut("0712345678".into()));
    }

    #[test]
    fn unknown_sender_is_unauthorized() {
        assert_eq!(
            validator().validate(PAYMENT, "+254700000000", None),
            Err(ValidationError::UnauthorizedSender)
        );
    }

    #[test]
    fn site_link_senders_only_for_site_link_texts() {
        let v = validator();
        assert_eq!(
            v.validate("BHSL 0748481418:250:QWE123XR Payment Confirmed", "+254748484118", None),
            Ok(())
        );
        assert_eq!(
            v.validate(PAYMENT, "+254748484118", None),
            Err(ValidationError::UnauthorizedSender)
        );
    }

    #[test]
    fn empty_allow_list_accepts_anyone() {
        let v = Validator::new(&SmsConfig {
            allowed_senders: Vec::new(),
            ..SmsConfig::default()
        });
        assert_eq!(v.validate(PAYMENT, "ANYONE", None), Ok(()));
    }

    #[test]
    fn sim_slot_mismatch_is_unauthorized() {
        let v = Validator::new(&SmsConfig {
            sim_slot: Some(1),
            ..SmsConfig::default()
        });
        assert_eq!(v.validate(PAYMENT, "MPESA", Some(0)), Err(ValidationError::UnauthorizedSender));
        assert_eq!(v.validate(PAYMENT, "MPESA", None), Err(ValidationError::UnauthorizedSender));
        assert_eq!(v.validate(PAYMENT, "MPESA", Some(1)), Ok(()));
    }

    #[test]
    fn repeat_is_duplicate() {
        let v = validator();
        assert_eq!(v.validate(PAYMENT, "MPESA", None), Ok(()));
        assert_eq!(v.validate(PAYMENT, "MPESA", None), Err(ValidationError::DuplicateMessage));
    }

    #[test]
    fn check_alone_does_not_remember() {
        let v = validator();
        assert_eq!(v.check(PAYMENT, "MPESA", None), Ok(()));
        assert_eq!(v.check(PAYMENT, "MPESA", None), Ok(()));
        v.remember(PAYMENT, "MPESA");
        assert_eq!(v.check(PAYMENT, "MPESA", None), Err(ValidationError::DuplicateMessage));
    }

    #[test]
    fn remembering_twice_keeps_one_entry() {
        let v = Validator::new(&SmsConfig {
            dedup_capacity: 2,
            ..SmsConfig::default()
        });
        v.remember("received Ksh1.00 a", "MPESA");
        v.remember("received Ksh1.00 a", "MPESA");
        v.remember("received Ksh1.00 b", "MPESA");
        assert_eq!(
            v.check("received Ksh1.00 a", "MPESA", None),
            Err(ValidationError::DuplicateMessage)
        );
    }

    #[test]
    fn rejected_messages_are_not_remembered() {
        let v = validator();
        assert!(v.validate(PAYMENT, "STRANGER", None).is_err());
        assert_eq!(v.validate(PAYMENT, "MPESA", None), Ok(()));
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let v = Validator::new(&SmsConfig {
            dedup_capacity: 2,
            ..SmsConfig::default()
        });
        for text in ["received Ksh1.00 a", "received Ksh1.00 b", "received Ksh1.00 c"] {
            assert_eq!(v.validate(text, "MPESA", None), Ok(()));
        }
        assert_eq!(v.validate("received Ksh1.00 a", "MPESA", None), Ok(()));
        assert_eq!(
            v.validate("received Ksh1.00 c", "MPESA", None),
            Err(ValidationError::DuplicateMessage)
        );
    }

    proptest! {
        #[test]
        fn distinct_texts_within_capacity_all_pass(n in 1usize..50) {
            let v = validator();
            for i in 0..n {
                let text = format!("received Ksh{i}.00 from payer {i}");
                prop_assert_eq!(v.validate(&text, "MPESA", None), Ok(()));
            }
            let again = format!("received Ksh{}.00 from payer {}", n - 1, n - 1);
            prop_assert_eq!(v.validate(&again, "MPESA", None), Err(ValidationError::DuplicateMessage));
        }
    }
}
