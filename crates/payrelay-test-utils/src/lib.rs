// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Payrelay integration tests.
//!
//! - [`MockTransport`] - socket transport that records sends and injects failures
//! - [`FlakyStorage`] - storage wrapper that fails writes on demand
//! - [`TestHarness`] - the full forwarding stack on a temp database

pub mod flaky_storage;
pub mod harness;
pub mod mock_transport;

pub use flaky_storage::FlakyStorage;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_transport::{MockTransport, SentMessage};
