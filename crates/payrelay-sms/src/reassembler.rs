// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-part SMS reassembly.
//!
//! All fragments of a message arrive within one intake event, so there is no
//! buffering across calls. Fragments are grouped by `(sender, timestamp)` so
//! that concurrent senders in the same batch stay apart.

use payrelay_core::types::RawSmsMessage;
use tracing::{debug, warn};

use crate::pdu::decode_pdu;

/// Stateless reassembler for one intake batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct Reassembler;

impl Reassembler {
    pub fn new() -> Self {
        Self
    }

    /// Decode a batch of PDUs into complete messages.
    ///
    /// Messages come out in first-arrival order of their key, bodies joined in
    /// arrival order. An empty batch, or a batch with any undecodable
    /// fragment, yields no messages.
    pub fn assemble<P: AsRef<[u8]>>(&self, pdus: &[P], sim_slot: Option<i32>) -> Vec<RawSmsMessage> {
        if pdus.is_empty() {
            debug!("empty PDU batch ignored");
            return Vec::new();
        }

        let mut messages: Vec<RawSmsMessage> = Vec::new();
        for (index, raw) in pdus.iter().enumerate() {
            let fragment = match decode_pdu(raw.as_ref()) {
                Ok(f) => f,
                Err(e) => {
                    warn!(index, error = %e, "malformed PDU, dropping batch");
                    return Vec::new();
                }
            };

            match messages
                .iter_mut()
                .find(|m| m.sender == fragment.sender && m.timestamp == fragment.timestamp)
            {
                Some(existing) => existing.message.push_str(&fragment.body),
                None => messages.push(RawSmsMessage {
                    message: fragment.body,
                    sender: fragment.sender,
                    sim_slot,
                    timestamp: fragment.timestamp,
                }),
            }
        }

        debug!(fragments = pdus.len(), messages = messages.len(), "PDU batch reassembled");
        messages
    }
}
