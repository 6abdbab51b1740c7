//! SQLite implementation of [`RecordStore`].
//!
//! # Invariants
//! - Conditional writes are single statements whose affected-row count
//!   decides the precondition; there is no read-then-write window.
//! - `NULL` columns are omitted from returned items.
//! - Map attributes round-trip through JSON text unchanged.

use super::schema::{self, AttributeKind, ATTRIBUTES, KEY_ATTRIBUTE, TABLE_NAME};
use super::{Item, KeyExpectation, RecordStore, StoreError, StoreResult};
use rusqlite::{params_from_iter, Connection, Row};
use serde_json::Value;

/// Record store backed by a migrated SQLite connection.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Wraps a connection returned by [`crate::db::open_db`] or
    /// [`crate::db::open_db_in_memory`].
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn put(&self, item: &Item, require_absent: bool) -> StoreResult<()> {
        let key = schema::check_item(item)?;

        let mut values = vec![Some(key.to_string())];
        for (name, _) in ATTRIBUTES {
            values.push(encode(item.get(*name))?);
        }

        let columns = select_columns();
        let slots = placeholders(1, values.len());
        let sql = if require_absent {
            format!(
                "INSERT INTO {TABLE_NAME} ({columns}) VALUES ({slots})
                 ON CONFLICT({KEY_ATTRIBUTE}) DO NOTHING;"
            )
        } else {
            format!("INSERT OR REPLACE INTO {TABLE_NAME} ({columns}) VALUES ({slots});")
        };

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if require_absent && changed == 0 {
            return Err(StoreError::PreconditionFailed {
                key: key.to_string(),
                expectation: KeyExpectation::Absent,
            });
        }

        Ok(())
    }

    fn update(&self, key: &str, fields: &Item, require_present: bool) -> StoreResult<()> {
        schema::check_update(fields)?;

        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        let mut values = Vec::with_capacity(names.len() + 1);
        for value in fields.values() {
            values.push(encode(Some(value))?);
        }

        let changed = if require_present {
            let assignments = names
                .iter()
                .enumerate()
                .map(|(position, name)| format!("{name} = ?{}", position + 1))
                .collect::<Vec<_>>()
                .join(", ");
            values.push(Some(key.to_string()));
            let sql = format!(
                "UPDATE {TABLE_NAME} SET {assignments} WHERE {KEY_ATTRIBUTE} = ?{};",
                values.len()
            );
            self.conn.execute(&sql, params_from_iter(values))?
        } else {
            let assignments = names
                .iter()
                .map(|name| format!("{name} = excluded.{name}"))
                .collect::<Vec<_>>()
                .join(", ");
            values.insert(0, Some(key.to_string()));
            let sql = format!(
                "INSERT INTO {TABLE_NAME} ({KEY_ATTRIBUTE}, {}) VALUES ({})
                 ON CONFLICT({KEY_ATTRIBUTE}) DO UPDATE SET {assignments};",
                names.join(", "),
                placeholders(1, values.len())
            );
            self.conn.execute(&sql, params_from_iter(values))?
        };

        if require_present && changed == 0 {
            return Err(StoreError::PreconditionFailed {
                key: key.to_string(),
                expectation: KeyExpectation::Present,
            });
        }

        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.conn.execute(
            &format!("DELETE FROM {TABLE_NAME} WHERE {KEY_ATTRIBUTE} = ?1;"),
            [key],
        )?;
        Ok(())
    }

    fn query_by_key(&self, key: &str) -> StoreResult<Option<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {TABLE_NAME} WHERE {KEY_ATTRIBUTE} = ?1;",
            select_columns()
        ))?;

        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }

        Ok(None)
    }

    fn query_by_index(&self, index_name: &str, value: &str) -> StoreResult<Vec<Item>> {
        let index = schema::resolve_index(index_name)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {TABLE_NAME} INDEXED BY \"{}\" WHERE {} = ?1;",
            select_columns(),
            index.name,
            index.attribute
        ))?;

        let mut rows = stmt.query([value])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }

        Ok(items)
    }
}

fn select_columns() -> String {
    std::iter::once(KEY_ATTRIBUTE)
        .chain(ATTRIBUTES.iter().map(|(name, _)| *name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|position| format!("?{position}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn encode(value: Option<&Value>) -> StoreResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => serde_json::to_string(other)
            .map(Some)
            .map_err(StoreError::malformed),
    }
}

fn parse_item_row(row: &Row<'_>) -> StoreResult<Item> {
    let mut item = Item::new();
    item.insert(
        KEY_ATTRIBUTE.to_string(),
        Value::String(row.get(KEY_ATTRIBUTE)?),
    );

    for (name, kind) in ATTRIBUTES {
        let Some(text) = row.get::<_, Option<String>>(*name)? else {
            continue;
        };
        let value = match kind {
            AttributeKind::Text => Value::String(text),
            AttributeKind::Map => match serde_json::from_str::<Value>(&text) {
                Ok(value @ Value::Object(_)) => value,
                _ => {
                    return Err(StoreError::unavailable(format!(
                        "invalid persisted value in {TABLE_NAME}.{name}"
                    )))
                }
            },
        };
        item.insert((*name).to_string(), value);
    }

    Ok(item)
}
