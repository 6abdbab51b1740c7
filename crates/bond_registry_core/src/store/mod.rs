//! Record store adapter over the keyed `bond` table.
//!
//! # Responsibility
//! - Expose the primitive operations the bond engine composes: conditional
//!   put, conditional update, delete, key lookup and index lookup.
//! - Collapse backend failures into two kinds: [`StoreError::Unavailable`]
//!   and [`StoreError::PreconditionFailed`].
//!
//! # Invariants
//! - Existence preconditions are checked by the backend in the same
//!   statement as the write, never by a separate read.
//! - Adapters know the table layout ([`schema`]) but nothing about bonds.
//! - Index queries return rows in backend order; no sort is applied here.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// One stored record as an attribute map.
///
/// Text attributes hold `Value::String`; map attributes hold `Value::Object`.
pub type Item = serde_json::Map<String, serde_json::Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Existence condition attached to a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExpectation {
    /// The key must not exist yet.
    Absent,
    /// The key must already exist.
    Present,
}

#[derive(Debug)]
pub enum StoreError {
    /// Backend unreachable, failing, or the request itself was malformed.
    ///
    /// `source` keeps the backend error when there is one.
    Unavailable {
        message: String,
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    /// An atomic existence check did not hold.
    PreconditionFailed {
        key: String,
        expectation: KeyExpectation,
    },
}

impl StoreError {
    /// Unavailable failure with no underlying backend error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn malformed(message: impl Display) -> Self {
        Self::unavailable(format!("malformed request: {message}"))
    }

    fn backend(err: impl Error + Send + Sync + 'static) -> Self {
        Self::Unavailable {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { message, .. } => write!(f, "record store unavailable: {message}"),
            Self::PreconditionFailed {
                key,
                expectation: KeyExpectation::Absent,
            } => write!(f, "precondition failed: record `{key}` already exists"),
            Self::PreconditionFailed {
                key,
                expectation: KeyExpectation::Present,
            } => write!(f, "precondition failed: record `{key}` does not exist"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable {
                source: Some(err), ..
            } => Some(&**err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::backend(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::backend(value)
    }
}

/// Primitive operations over one keyed table with secondary indexes.
pub trait RecordStore {
    /// Inserts or fully overwrites `item`.
    ///
    /// With `require_absent`, fails with `PreconditionFailed` when the key
    /// already exists and leaves the stored record untouched.
    fn put(&self, item: &Item, require_absent: bool) -> StoreResult<()>;

    /// Replaces the named attributes of the record at `key`.
    ///
    /// With `require_present`, fails with `PreconditionFailed` when no record
    /// has that key. Without it, a missing record is created.
    fn update(&self, key: &str, fields: &Item, require_present: bool) -> StoreResult<()>;

    /// Removes the record at `key`. Absence is not an error.
    fn delete(&self, key: &str) -> StoreResult<()>;

    fn query_by_key(&self, key: &str) -> StoreResult<Option<Item>>;

    /// Returns every record whose indexed attribute equals `value`.
    fn query_by_index(&self, index_name: &str, value: &str) -> StoreResult<Vec<Item>>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn put(&self, item: &Item, require_absent: bool) -> StoreResult<()> {
        (**self).put(item, require_absent)
    }

    fn update(&self, key: &str, fields: &Item, require_present: bool) -> StoreResult<()> {
        (**self).update(key, fields, require_present)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn query_by_key(&self, key: &str) -> StoreResult<Option<Item>> {
        (**self).query_by_key(key)
    }

    fn query_by_index(&self, index_name: &str, value: &str) -> StoreResult<Vec<Item>> {
        (**self).query_by_index(index_name, value)
    }
}
