//! Bond operations engine.
//!
//! # Responsibility
//! - Provide the bond registry's function-call surface.
//! - Translate `PreconditionFailed` into `BondAlreadyExists` / `BondNotFound`
//!   and `Unavailable` into `Store`.
//!
//! # Invariants
//! - `create_bond` and `update_bond` rely on the store's atomic existence
//!   check; exactly one of two racing creators wins.
//! - `get_bond` reports absence as `Ok(None)`; `delete_bond` treats absence
//!   as success.
//! - No state is kept between calls and nothing is retried.
//!
//! # Known race
//! `add_subscriber` and `remove_subscriber` read the bond, transform it and
//! write it back with no version check. Two concurrent subscriber changes on
//! the same bond can interleave so that the later write discards the earlier
//! one (lost update).

use crate::model::bond::{Bond, BondId};
use crate::model::subscriber::{Subscriber, SubscriberId};
use crate::store::schema::{
    HOST_ACCOUNT_ID_INDEX, HOST_COST_CENTER_INDEX, KEY_ATTRIBUTE, SUB_ACCOUNT_ID_INDEX,
    SUB_COST_CENTER_INDEX,
};
use crate::store::{Item, RecordStore, StoreError};
use log::{debug, error};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, BondServiceError>;

/// Bond-level error kinds.
#[derive(Debug)]
pub enum BondServiceError {
    /// `create_bond` found a record with the same id.
    BondAlreadyExists { bond_id: BondId },
    /// The bond to update or change subscribers on does not exist.
    BondNotFound {
        bond_id: BondId,
        sid: Option<SubscriberId>,
    },
    /// Record store failure; never retried here.
    Store(StoreError),
    /// A stored record could not be decoded into a bond.
    InvalidData(String),
}

impl Display for BondServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BondAlreadyExists { bond_id } => {
                write!(f, "bond already exists: bond_id={bond_id}")
            }
            Self::BondNotFound { bond_id, sid: None } => {
                write!(f, "bond not found: bond_id={bond_id}")
            }
            Self::BondNotFound {
                bond_id,
                sid: Some(sid),
            } => write!(
                f,
                "bond not found: bond_id={bond_id}; cannot change subscriber sid={sid}"
            ),
            Self::Store(err) => write!(f, "unexpected error querying the registry: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted bond data: {message}"),
        }
    }
}

impl Error for BondServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Bond registry operations over an injected record store.
pub struct BondService<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> BondService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Inserts a new bond.
    ///
    /// # Errors
    /// - `BondAlreadyExists` when `bond.bond_id` is taken; the stored record
    ///   is left untouched.
    /// - `Store` when the store fails.
    pub fn create_bond(&self, bond: Bond) -> ServiceResult<Bond> {
        debug!(
            "event=bond_create module=registry status=start bond_id={}",
            bond.bond_id
        );

        let item = bond_to_item(&bond)?;
        match self.store.put(&item, true) {
            Ok(()) => {
                debug!(
                    "event=bond_create module=registry status=ok bond_id={}",
                    bond.bond_id
                );
                Ok(bond)
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                debug!(
                    "event=bond_create module=registry status=rejected reason=already_exists bond_id={}",
                    bond.bond_id
                );
                Err(BondServiceError::BondAlreadyExists {
                    bond_id: bond.bond_id,
                })
            }
            Err(err) => Err(store_failure("bond_create", &bond.bond_id, err)),
        }
    }

    /// Overwrites all non-key fields of an existing bond.
    ///
    /// # Errors
    /// - `BondNotFound` when no bond has `bond.bond_id`; nothing is written.
    /// - `Store` when the store fails.
    pub fn update_bond(&self, bond: Bond) -> ServiceResult<Bond> {
        debug!(
            "event=bond_update module=registry status=start bond_id={}",
            bond.bond_id
        );

        let mut fields = bond_to_item(&bond)?;
        fields.remove(KEY_ATTRIBUTE);

        match self.store.update(&bond.bond_id, &fields, true) {
            Ok(()) => {
                debug!(
                    "event=bond_update module=registry status=ok bond_id={} subscribers={}",
                    bond.bond_id,
                    bond.subscribers.len()
                );
                Ok(bond)
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                debug!(
                    "event=bond_update module=registry status=rejected reason=not_found bond_id={}",
                    bond.bond_id
                );
                Err(BondServiceError::BondNotFound {
                    bond_id: bond.bond_id,
                    sid: None,
                })
            }
            Err(err) => Err(store_failure("bond_update", &bond.bond_id, err)),
        }
    }

    /// Deletes a bond. Deleting an absent bond succeeds.
    pub fn delete_bond(&self, bond_id: &str) -> ServiceResult<()> {
        debug!("event=bond_delete module=registry status=start bond_id={bond_id}");
        self.store
            .delete(bond_id)
            .map_err(|err| store_failure("bond_delete", bond_id, err))?;
        debug!("event=bond_delete module=registry status=ok bond_id={bond_id}");
        Ok(())
    }

    /// Fetches one bond by id, `None` when absent.
    pub fn get_bond(&self, bond_id: &str) -> ServiceResult<Option<Bond>> {
        debug!("event=bond_get module=registry status=start bond_id={bond_id}");

        let item = self
            .store
            .query_by_key(bond_id)
            .map_err(|err| store_failure("bond_get", bond_id, err))?;

        match item {
            Some(item) => {
                let bond = bond_from_item(item)?;
                debug!("event=bond_get module=registry status=ok found=true bond_id={bond_id}");
                Ok(Some(bond))
            }
            None => {
                debug!("event=bond_get module=registry status=ok found=false bond_id={bond_id}");
                Ok(None)
            }
        }
    }

    pub fn get_bonds_by_host_cost_center(&self, host_cost_center: &str) -> ServiceResult<Vec<Bond>> {
        self.get_bonds_by_index(HOST_COST_CENTER_INDEX, host_cost_center)
    }

    pub fn get_bonds_by_host_account_id(&self, host_account_id: &str) -> ServiceResult<Vec<Bond>> {
        self.get_bonds_by_index(HOST_ACCOUNT_ID_INDEX, host_account_id)
    }

    pub fn get_bonds_by_sub_cost_center(&self, sub_cost_center: &str) -> ServiceResult<Vec<Bond>> {
        self.get_bonds_by_index(SUB_COST_CENTER_INDEX, sub_cost_center)
    }

    pub fn get_bonds_by_sub_account_id(&self, sub_account_id: &str) -> ServiceResult<Vec<Bond>> {
        self.get_bonds_by_index(SUB_ACCOUNT_ID_INDEX, sub_account_id)
    }

    /// Adds `subscriber` to a bond, replacing any entry with the same `sid`.
    ///
    /// Read-modify-write without a version check; see the module docs.
    ///
    /// # Errors
    /// - `BondNotFound` (with `sid`) when the bond does not exist, including
    ///   when it is deleted between the read and the write.
    pub fn add_subscriber(&self, bond_id: &str, subscriber: Subscriber) -> ServiceResult<Bond> {
        debug!(
            "event=subscriber_add module=registry status=start bond_id={bond_id} sid={}",
            subscriber.sid
        );

        let Some(bond) = self.get_bond(bond_id)? else {
            return Err(BondServiceError::BondNotFound {
                bond_id: bond_id.to_string(),
                sid: Some(subscriber.sid),
            });
        };

        let sid = subscriber.sid.clone();
        self.update_bond(bond.with_subscriber_added(subscriber))
            .map_err(|err| with_subscriber_context(err, sid))
    }

    /// Removes subscriber `sid` from a bond.
    ///
    /// An unknown `sid` leaves the mapping unchanged, and the bond is still
    /// written back so the write is observable downstream.
    ///
    /// # Errors
    /// - `BondNotFound` (with `sid`) when the bond does not exist.
    pub fn remove_subscriber(&self, bond_id: &str, sid: &str) -> ServiceResult<Bond> {
        debug!("event=subscriber_remove module=registry status=start bond_id={bond_id} sid={sid}");

        let Some(bond) = self.get_bond(bond_id)? else {
            return Err(BondServiceError::BondNotFound {
                bond_id: bond_id.to_string(),
                sid: Some(sid.to_string()),
            });
        };

        self.update_bond(bond.with_subscriber_removed(sid))
            .map_err(|err| with_subscriber_context(err, sid.to_string()))
    }

    fn get_bonds_by_index(&self, index_name: &'static str, value: &str) -> ServiceResult<Vec<Bond>> {
        debug!("event=bond_list module=registry status=start index={index_name} value={value}");

        let items = self
            .store
            .query_by_index(index_name, value)
            .map_err(|err| {
                error!(
                    "event=bond_list module=registry status=error index={index_name} error={err}"
                );
                BondServiceError::Store(err)
            })?;

        let bonds = items
            .into_iter()
            .map(bond_from_item)
            .collect::<ServiceResult<Vec<_>>>()?;
        debug!(
            "event=bond_list module=registry status=ok index={index_name} count={}",
            bonds.len()
        );
        Ok(bonds)
    }
}

fn store_failure(event: &str, bond_id: &str, err: StoreError) -> BondServiceError {
    error!("event={event} module=registry status=error bond_id={bond_id} error={err}");
    BondServiceError::Store(err)
}

fn with_subscriber_context(err: BondServiceError, sid: SubscriberId) -> BondServiceError {
    match err {
        BondServiceError::BondNotFound { bond_id, sid: None } => BondServiceError::BondNotFound {
            bond_id,
            sid: Some(sid),
        },
        other => other,
    }
}

fn bond_to_item(bond: &Bond) -> ServiceResult<Item> {
    match serde_json::to_value(bond) {
        Ok(Value::Object(item)) => Ok(item),
        Ok(_) => Err(BondServiceError::InvalidData(format!(
            "bond `{}` did not encode as a record",
            bond.bond_id
        ))),
        Err(err) => Err(BondServiceError::InvalidData(err.to_string())),
    }
}

fn bond_from_item(item: Item) -> ServiceResult<Bond> {
    let key = item
        .get(KEY_ATTRIBUTE)
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
        .to_string();
    serde_json::from_value(Value::Object(item))
        .map_err(|err| BondServiceError::InvalidData(format!("bond_id={key}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{BondService, BondServiceError};
    use crate::model::bond::Bond;
    use crate::model::subscriber::Subscriber;
    use crate::store::schema::HOST_ACCOUNT_ID_INDEX;
    use crate::store::{Item, MemoryRecordStore, RecordStore, StoreError, StoreResult};
    use serde_json::json;

    /// Store whose every operation reports the backend as unreachable.
    struct UnreachableStore;

    impl RecordStore for UnreachableStore {
        fn put(&self, _item: &Item, _require_absent: bool) -> StoreResult<()> {
            Err(unreachable_error())
        }

        fn update(&self, _key: &str, _fields: &Item, _require_present: bool) -> StoreResult<()> {
            Err(unreachable_error())
        }

        fn delete(&self, _key: &str) -> StoreResult<()> {
            Err(unreachable_error())
        }

        fn query_by_key(&self, _key: &str) -> StoreResult<Option<Item>> {
            Err(unreachable_error())
        }

        fn query_by_index(&self, _index_name: &str, _value: &str) -> StoreResult<Vec<Item>> {
            Err(unreachable_error())
        }
    }

    fn unreachable_error() -> StoreError {
        StoreError::unavailable("connection refused")
    }

    fn bond(id: &str) -> Bond {
        Bond::new(id, "H1", "S1", "red", "blue")
    }

    #[test]
    fn create_then_get_returns_equal_bond() {
        let service = BondService::new(MemoryRecordStore::new());
        let created = service
            .create_bond(bond("b1").with_subscriber_added(Subscriber::new("u1", "A", "a@x.com")))
            .unwrap();

        assert_eq!(service.get_bond("b1").unwrap(), Some(created));
    }

    #[test]
    fn create_duplicate_reports_already_exists() {
        let service = BondService::new(MemoryRecordStore::new());
        service.create_bond(bond("b1")).unwrap();

        let err = service.create_bond(bond("b1")).unwrap_err();
        assert!(matches!(err, BondServiceError::BondAlreadyExists { ref bond_id } if bond_id == "b1"));
        assert!(err.to_string().contains("bond_id=b1"));
    }

    #[test]
    fn update_missing_reports_not_found_without_writing() {
        let store = MemoryRecordStore::new();
        let service = BondService::new(&store);

        let err = service.update_bond(bond("ghost")).unwrap_err();
        assert!(matches!(
            err,
            BondServiceError::BondNotFound { ref bond_id, sid: None } if bond_id == "ghost"
        ));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn subscriber_ops_on_missing_bond_carry_sid() {
        let service = BondService::new(MemoryRecordStore::new());

        let add_err = service
            .add_subscriber("ghost", Subscriber::new("u1", "A", "a@x.com"))
            .unwrap_err();
        assert!(matches!(
            add_err,
            BondServiceError::BondNotFound { sid: Some(ref sid), .. } if sid == "u1"
        ));
        assert!(add_err.to_string().contains("sid=u1"));

        let remove_err = service.remove_subscriber("ghost", "u2").unwrap_err();
        assert!(matches!(
            remove_err,
            BondServiceError::BondNotFound { sid: Some(ref sid), .. } if sid == "u2"
        ));
    }

    #[test]
    fn store_failures_surface_as_store_errors() {
        let service = BondService::new(UnreachableStore);

        assert!(matches!(service.create_bond(bond("b1")), Err(BondServiceError::Store(_))));
        assert!(matches!(service.update_bond(bond("b1")), Err(BondServiceError::Store(_))));
        assert!(matches!(service.delete_bond("b1"), Err(BondServiceError::Store(_))));
        assert!(matches!(service.get_bond("b1"), Err(BondServiceError::Store(_))));
        assert!(matches!(
            service.get_bonds_by_sub_account_id("S1"),
            Err(BondServiceError::Store(_))
        ));
        assert!(matches!(
            service.add_subscriber("b1", Subscriber::new("u1", "A", "a@x.com")),
            Err(BondServiceError::Store(_))
        ));
    }

    #[test]
    fn undecodable_record_is_invalid_data() {
        let store = MemoryRecordStore::new();
        store
            .put(
                json!({ "bond_id": "partial", "host_account_id": "H9" })
                    .as_object()
                    .unwrap(),
                true,
            )
            .unwrap();
        let service = BondService::new(&store);

        assert!(matches!(
            service.get_bond("partial"),
            Err(BondServiceError::InvalidData(message)) if message.contains("partial")
        ));
        assert!(matches!(
            service.get_bonds_by_host_account_id("H9"),
            Err(BondServiceError::InvalidData(_))
        ));
        assert_eq!(store.query_by_index(HOST_ACCOUNT_ID_INDEX, "H9").unwrap().len(), 1);
    }
}
