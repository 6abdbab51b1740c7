//! In-process [`RecordStore`] with the same contract as the SQLite store.
//!
//! Every operation holds the table lock for its full duration, so
//! conditional writes are atomic with respect to other callers.

use super::schema::{self, KEY_ATTRIBUTE};
use super::{Item, KeyExpectation, RecordStore, StoreError, StoreResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Mutex-guarded ordered map keyed by `bond_id`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    items: Mutex<BTreeMap<String, Item>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, Item>>> {
        self.items
            .lock()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }
}

impl RecordStore for MemoryRecordStore {
    fn put(&self, item: &Item, require_absent: bool) -> StoreResult<()> {
        let key = schema::check_item(item)?;
        let mut items = self.lock()?;

        if require_absent && items.contains_key(key) {
            return Err(StoreError::PreconditionFailed {
                key: key.to_string(),
                expectation: KeyExpectation::Absent,
            });
        }

        items.insert(key.to_string(), item.clone());
        Ok(())
    }

    fn update(&self, key: &str, fields: &Item, require_present: bool) -> StoreResult<()> {
        schema::check_update(fields)?;
        let mut items = self.lock()?;

        if require_present && !items.contains_key(key) {
            return Err(StoreError::PreconditionFailed {
                key: key.to_string(),
                expectation: KeyExpectation::Present,
            });
        }

        let record = items.entry(key.to_string()).or_insert_with(|| {
            let mut fresh = Item::new();
            fresh.insert(KEY_ATTRIBUTE.to_string(), Value::String(key.to_string()));
            fresh
        });

        for (name, value) in fields {
            record.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn query_by_key(&self, key: &str) -> StoreResult<Option<Item>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn query_by_index(&self, index_name: &str, value: &str) -> StoreResult<Vec<Item>> {
        let index = schema::resolve_index(index_name)?;
        let items = self.lock()?;

        Ok(items
            .values()
            .filter(|item| item.get(index.attribute).and_then(Value::as_str) == Some(value))
            .cloned()
            .collect())
    }
}
