//! In-memory implementation of RecordStore for testing and development

use crate::core::entity::{EntityId, Filter, ID_FIELD, Record, values_match};
use crate::core::store::RecordStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Table {
    rows: IndexMap<EntityId, Record>,
    next_id: i64,
}

impl Table {
    fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::Int(self.next_id)
    }
}

/// In-memory record store
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// tables are created on first insert.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl InMemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, table: &str, f: impl FnOnce(Option<&Table>) -> T) -> Result<T> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(f(tables.get(table)))
    }
}

fn column_matches(row: &Record, column: &str, values: &[Value]) -> bool {
    row.get(column)
        .is_some_and(|actual| values.iter().any(|v| values_match(actual, v)))
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>> {
        self.read(table, |t| {
            t.map(|t| {
                t.rows
                    .values()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
        })
    }

    async fn select_in(&self, table: &str, column: &str, values: &[Value]) -> Result<Vec<Record>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        self.read(table, |t| {
            t.map(|t| {
                t.rows
                    .values()
                    .filter(|row| column_matches(row, column, values))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
        })
    }

    async fn insert(&self, table: &str, mut record: Record) -> Result<Record> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let table_data = tables.entry(table.to_string()).or_default();

        let id = match EntityId::of(&record) {
            Some(id) => {
                if table_data.rows.contains_key(&id) {
                    return Err(anyhow!("Row {} already exists in '{}'", id, table));
                }
                if let EntityId::Int(n) = id {
                    table_data.next_id = table_data.next_id.max(n);
                }
                id
            }
            None => table_data.allocate_id(),
        };

        record.insert(ID_FIELD.to_string(), id.to_value());
        table_data.rows.insert(id, record.clone());

        Ok(record)
    }

    async fn update(&self, table: &str, id: &EntityId, patch: Record) -> Result<u64> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(row) = tables.get_mut(table).and_then(|t| t.rows.get_mut(id)) else {
            return Ok(0);
        };
        for (key, value) in patch {
            if key != ID_FIELD {
                row.insert(key, value);
            }
        }

        Ok(1)
    }

    async fn delete(&self, table: &str, id: &EntityId) -> Result<u64> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let removed = tables
            .get_mut(table)
            .and_then(|t| t.rows.shift_remove(id))
            .is_some();

        Ok(removed as u64)
    }

    async fn delete_where(&self, table: &str, column: &str, value: &Value) -> Result<u64> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(t) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = t.rows.len();
        t.rows
            .retain(|_, row| !column_matches(row, column, std::slice::from_ref(value)));

        Ok((before - t.rows.len()) as u64)
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        self.read(table, |t| {
            t.map(|t| t.rows.values().filter(|row| filter.matches(row)).count() as u64)
                .unwrap_or(0)
        })
    }
}
