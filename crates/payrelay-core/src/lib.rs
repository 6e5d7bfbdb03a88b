// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Payrelay forwarding service.
//!
//! This crate provides the domain types, the error type, and the adapter
//! traits for the durable store and the socket transport. The SMS pipeline,
//! the storage backend and the dispatcher all build on it.

pub mod api;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RelayError;
pub use types::{
    AdapterType, AgentCommission, AuthParams, ConnectedApp, ConnectionState, Customer,
    EpochMillis, HealthStatus, Offer, OfferTag, OfferType, PaymentDetails, RawSmsMessage,
    RescheduleInfo, RescheduleMode, SmsMessage, Transaction, TransactionStatus, TransactionType,
    TransportEvent, now_millis,
};

pub use traits::{PluginAdapter, SocketTransport, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_error_has_all_variants() {
        let _config = RelayError::Config("test".into());
        let _storage = RelayError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _transport = RelayError::Transport {
            message: "test".into(),
            source: None,
        };
        let _auth = RelayError::AuthRequired("test".into());
        let _not_found = RelayError::NotFound {
            entity: "offer",
            id: "x".into(),
        };
        let _limit = RelayError::RetryLimitExceeded {
            id: "x".into(),
            retries: 3,
            max: 3,
        };
        let _timeout = RelayError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = RelayError::Internal("test".into());
    }

    #[test]
    fn adapter_type_round_trip() {
        use std::str::FromStr;

        for variant in [AdapterType::Storage, AdapterType::Transport] {
            let s = variant.to_string();
            assert_eq!(AdapterType::from_str(&s).expect("should parse back"), variant);
        }
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), HealthStatus::Healthy);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_socket_transport<T: SocketTransport>() {}
    }
}
