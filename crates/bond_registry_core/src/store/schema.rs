//! Layout of the `bond` table shared by every record store implementation.
//!
//! Mirrors `db/migrations/0001_bond_table.sql`.

use super::{Item, StoreError, StoreResult};
use serde_json::Value;

pub const TABLE_NAME: &str = "bond";
pub const KEY_ATTRIBUTE: &str = "bond_id";

pub const HOST_COST_CENTER_INDEX: &str = "bond-host_cost_center-index";
pub const HOST_ACCOUNT_ID_INDEX: &str = "bond-host_account_id-index";
pub const SUB_COST_CENTER_INDEX: &str = "bond-sub_cost_center-index";
pub const SUB_ACCOUNT_ID_INDEX: &str = "bond-sub_account_id-index";

/// Storage shape of one non-key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Text,
    /// Nested object, persisted as JSON text.
    Map,
}

/// Non-key attributes in column order.
pub const ATTRIBUTES: &[(&str, AttributeKind)] = &[
    ("host_account_id", AttributeKind::Text),
    ("sub_account_id", AttributeKind::Text),
    ("host_cost_center", AttributeKind::Text),
    ("sub_cost_center", AttributeKind::Text),
    ("subscribers", AttributeKind::Map),
];

/// Single-attribute secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub attribute: &'static str,
}

pub const INDEXES: &[IndexDefinition] = &[
    IndexDefinition {
        name: HOST_COST_CENTER_INDEX,
        attribute: "host_cost_center",
    },
    IndexDefinition {
        name: HOST_ACCOUNT_ID_INDEX,
        attribute: "host_account_id",
    },
    IndexDefinition {
        name: SUB_COST_CENTER_INDEX,
        attribute: "sub_cost_center",
    },
    IndexDefinition {
        name: SUB_ACCOUNT_ID_INDEX,
        attribute: "sub_account_id",
    },
];

pub fn find_index(name: &str) -> Option<&'static IndexDefinition> {
    INDEXES.iter().find(|index| index.name == name)
}

pub fn attribute_kind(name: &str) -> Option<AttributeKind> {
    ATTRIBUTES
        .iter()
        .find(|(attribute, _)| *attribute == name)
        .map(|(_, kind)| *kind)
}

pub(crate) fn resolve_index(name: &str) -> StoreResult<&'static IndexDefinition> {
    find_index(name).ok_or_else(|| StoreError::malformed(format!("unknown index `{name}`")))
}

/// Returns the key of a full item, checking every attribute against the layout.
pub(crate) fn check_item(item: &Item) -> StoreResult<&str> {
    let key = match item.get(KEY_ATTRIBUTE) {
        Some(Value::String(key)) => key.as_str(),
        Some(_) => {
            return Err(StoreError::malformed(format!(
                "`{KEY_ATTRIBUTE}` must be a string"
            )))
        }
        None => {
            return Err(StoreError::malformed(format!(
                "item is missing `{KEY_ATTRIBUTE}`"
            )))
        }
    };

    for (name, value) in item {
        if name != KEY_ATTRIBUTE {
            check_attribute(name, value)?;
        }
    }

    Ok(key)
}

/// Checks a partial update: non-empty, key untouched, known attributes only.
pub(crate) fn check_update(fields: &Item) -> StoreResult<()> {
    if fields.is_empty() {
        return Err(StoreError::malformed("update names no attributes"));
    }
    if fields.contains_key(KEY_ATTRIBUTE) {
        return Err(StoreError::malformed(format!(
            "`{KEY_ATTRIBUTE}` is the key and cannot be updated"
        )));
    }
    for (name, value) in fields {
        check_attribute(name, value)?;
    }
    Ok(())
}

fn check_attribute(name: &str, value: &Value) -> StoreResult<()> {
    match (attribute_kind(name), value) {
        (Some(AttributeKind::Text), Value::String(_)) => Ok(()),
        (Some(AttributeKind::Map), Value::Object(_)) => Ok(()),
        (Some(kind), _) => Err(StoreError::malformed(format!(
            "attribute `{name}` expects {kind:?}"
        ))),
        (None, _) => Err(StoreError::malformed(format!(
            "unknown attribute `{name}` for table `{TABLE_NAME}`"
        ))),
    }
}
