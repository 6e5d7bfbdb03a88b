// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle hooks for the presentation layer.
//!
//! Both traits are notification-only: nothing a hook does flows back into
//! the pipeline or the dispatcher. Every method has an empty default.

use payrelay_core::types::{ConnectedApp, Transaction};

use crate::pipeline::RejectReason;

/// Observes SMS processing outcomes.
pub trait PipelineHooks: Send + Sync {
    /// A recommendation for `phone` lapsed. No transaction is created.
    fn on_recommendation_timeout(&self, _phone: &str) {}

    fn on_admitted(&self, _tx: &Transaction) {}

    fn on_rejected(&self, _reason: &RejectReason) {}
}

/// Observes the delivery dispatcher.
pub trait DispatchObserver: Send + Sync {
    fn on_start(&self) {}

    /// A transaction is about to be sent to `app`.
    fn on_message(&self, _tx: &Transaction, _app: &ConnectedApp) {}

    /// The queue drained; the dispatcher is waiting for the next wake-up.
    fn on_idle(&self) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PipelineHooks for NoopHooks {}

impl DispatchObserver for NoopHooks {}
