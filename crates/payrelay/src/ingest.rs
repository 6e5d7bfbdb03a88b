// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `payrelay ingest`: admit one message without a running relay.
//!
//! The transaction lands in the durable queue and is delivered by the next
//! `payrelay serve`.

use std::sync::Arc;

use payrelay_config::model::PayrelayConfig;
use payrelay_core::types::RawSmsMessage;
use payrelay_core::{RelayError, now_millis};
use payrelay_relay::shutdown::install_signal_handler;
use payrelay_relay::{ProcessOutcome, SmsProcessor};

use crate::store::Stack;

pub async fn run_ingest(
    config: &PayrelayConfig,
    sender: &str,
    text: &str,
    sim_slot: Option<i32>,
) -> Result<(), RelayError> {
    let stack = Stack::open(config).await?;
    // Ctrl-C stops store retries instead of leaving the command hanging.
    let processor = Arc::new(
        SmsProcessor::new(
            &config.sms,
            &config.dispatch,
            stack.catalog.clone(),
            stack.queue.clone(),
            stack.storage.clone(),
        )
        .with_shutdown(install_signal_handler()),
    );

    let raw = RawSmsMessage {
        message: text.to_string(),
        sender: sender.to_string(),
        sim_slot,
        timestamp: now_millis(),
    };
    let outcome = processor.process_message(&raw).await;
    stack.close().await?;

    match outcome {
        ProcessOutcome::Rejected(reason) => Err(RelayError::Internal(format!(
            "message rejected: {reason}"
        ))),
        outcome => {
            println!("{}", describe(&outcome));
            Ok(())
        }
    }
}

fn describe(outcome: &ProcessOutcome) -> String {
    match outcome {
        ProcessOutcome::Admitted { id, status } => format!("queued {id} ({status})"),
        ProcessOutcome::Rejected(reason) => format!("rejected: {reason}"),
        ProcessOutcome::RecommendationTimedOut { phone } => {
            format!("recommendation for {phone} timed out")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrelay_core::types::TransactionStatus;

    #[test]
    fn describes_admission() {
        let id = uuid::Uuid::nil();
        let text = describe(&ProcessOutcome::Admitted {
            id,
            status: TransactionStatus::Unmatched,
        });
        assert_eq!(text, format!("queued {id} (UNMATCHED)"));
    }

    #[test]
    fn describes_timeout() {
        let text = describe(&ProcessOutcome::RecommendationTimedOut {
            phone: "0712345678".into(),
        });
        assert!(text.contains("0712345678"));
    }
}
