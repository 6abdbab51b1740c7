//! Bond domain model.
//!
//! A bond is a charge-back relationship: the subscriber account pays the host
//! account for services the host provides. Each bond carries the individuals
//! authorized under it to request those services.
//!
//! # Invariants
//! - `bond_id` is assigned by the creator and never regenerated.
//! - `subscribers` keys always equal the embedded `Subscriber::sid`.
//! - Subscriber changes produce a new `Bond`; nothing mutates in place.

use crate::model::subscriber::{Subscriber, SubscriberId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque bond identifier; the sole storage key.
pub type BondId = String;

/// Charge-back relationship between a host and a subscriber account.
///
/// `(host_account_id, sub_account_id)` is the natural key, but storage is
/// keyed by `bond_id` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    pub bond_id: BondId,
    pub host_account_id: String,
    pub sub_account_id: String,
    /// Funding entity grouping the host account.
    pub host_cost_center: String,
    /// Funding entity grouping the subscriber account.
    pub sub_cost_center: String,
    #[serde(default)]
    pub subscribers: BTreeMap<SubscriberId, Subscriber>,
}

impl Bond {
    /// Creates a bond with no subscribers.
    pub fn new(
        bond_id: impl Into<BondId>,
        host_account_id: impl Into<String>,
        sub_account_id: impl Into<String>,
        host_cost_center: impl Into<String>,
        sub_cost_center: impl Into<String>,
    ) -> Self {
        Self {
            bond_id: bond_id.into(),
            host_account_id: host_account_id.into(),
            sub_account_id: sub_account_id.into(),
            host_cost_center: host_cost_center.into(),
            sub_cost_center: sub_cost_center.into(),
            subscribers: BTreeMap::new(),
        }
    }

    /// Returns this bond with `subscriber` inserted under its `sid`.
    ///
    /// An existing entry with the same `sid` is replaced whole; fields are
    /// not merged.
    pub fn with_subscriber_added(mut self, subscriber: Subscriber) -> Self {
        self.subscribers.insert(subscriber.sid.clone(), subscriber);
        self
    }

    /// Returns this bond without the subscriber `sid`.
    ///
    /// Unknown `sid` values leave the mapping unchanged.
    pub fn with_subscriber_removed(mut self, sid: &str) -> Self {
        self.subscribers.remove(sid);
        self
    }

    pub fn subscriber(&self, sid: &str) -> Option<&Subscriber> {
        self.subscribers.get(sid)
    }
}

#[cfg(test)]
mod tests {
    use super::Bond;
    use crate::model::subscriber::Subscriber;

    fn bond_with_subs() -> Bond {
        Bond::new("b1", "H1", "S1", "red", "blue")
            .with_subscriber_added(Subscriber::new("u1", "Ann", "ann@example.com"))
            .with_subscriber_added(Subscriber::new("u2", "Bo", "bo@example.com"))
    }

    #[test]
    fn add_to_empty_bond() {
        let bond = Bond::new("b1", "H1", "S1", "red", "blue")
            .with_subscriber_added(Subscriber::new("u1", "Ann", "ann@example.com"));

        assert_eq!(bond.subscribers.len(), 1);
        assert_eq!(bond.subscriber("u1").unwrap().name, "Ann");
    }

    #[test]
    fn add_with_existing_sid_overwrites_entry() {
        let bond = bond_with_subs()
            .with_subscriber_added(Subscriber::new("u1", "Ann Lee", "ann.lee@example.com"));

        assert_eq!(bond.subscribers.len(), 2);
        let replaced = bond.subscriber("u1").unwrap();
        assert_eq!(replaced.name, "Ann Lee");
        assert_eq!(replaced.email, "ann.lee@example.com");
        assert_eq!(bond.subscriber("u2").unwrap().name, "Bo");
    }

    #[test]
    fn add_identical_subscriber_is_stable() {
        let original = bond_with_subs();
        let again = original
            .clone()
            .with_subscriber_added(Subscriber::new("u2", "Bo", "bo@example.com"));

        assert_eq!(again, original);
    }

    #[test]
    fn remove_present_subscriber() {
        let bond = bond_with_subs().with_subscriber_removed("u1");

        assert!(bond.subscriber("u1").is_none());
        assert_eq!(bond.subscribers.len(), 1);
    }

    #[test]
    fn remove_missing_subscriber_is_noop() {
        let original = bond_with_subs();
        assert_eq!(original.clone().with_subscriber_removed("nobody"), original);

        let empty = Bond::new("b2", "H2", "S2", "red", "blue");
        assert_eq!(empty.clone().with_subscriber_removed("u1"), empty);
    }

    #[test]
    fn serializes_subscribers_as_sid_keyed_map() {
        let value = serde_json::to_value(bond_with_subs()).unwrap();

        assert_eq!(value["bond_id"], "b1");
        assert_eq!(value["subscribers"]["u2"]["sid"], "u2");
        assert_eq!(value["subscribers"]["u2"]["email"], "bo@example.com");
    }

    #[test]
    fn missing_subscribers_deserialize_as_empty() {
        let bond: Bond = serde_json::from_value(serde_json::json!({
            "bond_id": "b3",
            "host_account_id": "H3",
            "sub_account_id": "S3",
            "host_cost_center": "red",
            "sub_cost_center": "blue"
        }))
        .unwrap();

        assert!(bond.subscribers.is_empty());
    }
}
