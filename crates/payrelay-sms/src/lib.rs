// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS intake stages for Payrelay.
//!
//! Raw SMS-DELIVER PDUs are reassembled into complete texts, classified by
//! payment format, checked against sender policy and then turned into
//! structured [`SmsMessage`](payrelay_core::SmsMessage) values.

pub mod classifier;
pub mod error;
pub mod extractor;
pub mod gsm7;
pub mod pdu;
pub mod reassembler;
pub mod validation;

pub use classifier::{MessageKind, classify};
pub use error::{ClassifyError, ExtractionError, PduError, ValidationError};
pub use extractor::{Extractors, MessageExtractor};
pub use pdu::decode_hex_pdus;
pub use reassembler::Reassembler;
pub use validation::Validator;
