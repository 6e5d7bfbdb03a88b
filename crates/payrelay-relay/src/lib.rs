// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forwarding core of Payrelay.
//!
//! - [`SmsProcessor`] turns inbound SMS into queued transactions
//! - [`TransactionQueue`] is the durable, time-ordered record of undelivered work
//! - [`AppRegistry`] tracks connected apps and round-robin cursors
//! - [`Dispatcher`] drains the queue to online apps

pub mod dispatcher;
pub mod hooks;
pub mod offers;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod shutdown;

pub use dispatcher::{CycleEnd, DispatchExit, DispatchState, Dispatcher};
pub use hooks::{DispatchObserver, NoopHooks, PipelineHooks};
pub use offers::OfferCatalog;
pub use pipeline::{ProcessOutcome, RejectReason, SmsProcessor};
pub use queue::TransactionQueue;
pub use registry::AppRegistry;
