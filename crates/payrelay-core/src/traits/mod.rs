// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the collaborators the forwarding core consumes.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod storage;
pub mod transport;

pub use adapter::PluginAdapter;
pub use storage::StorageAdapter;
pub use transport::SocketTransport;
