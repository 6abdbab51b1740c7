//! Core storage-consistency logic for the bond registry.
//!
//! Bonds are charge-back relationships between a host account and a
//! subscriber account. This crate owns their create/update/delete, lookup
//! and subscriber-merge semantics over a keyed table with secondary indexes.

pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::bond::{Bond, BondId};
pub use model::subscriber::{
    is_valid_email, Subscriber, SubscriberId, SubscriberValidationError,
};
pub use service::bond_service::{BondService, BondServiceError, ServiceResult};
pub use store::{
    Item, KeyExpectation, MemoryRecordStore, RecordStore, SqliteRecordStore, StoreError,
    StoreResult,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
