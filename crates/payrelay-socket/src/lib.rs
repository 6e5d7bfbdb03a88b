// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport for forwarding payment messages to connected apps.

pub mod frame;
pub mod transport;

pub use transport::WsTransport;
