//! Shared test harness for storage backend testing
//!
//! Provides contract checks every [`RecordStore`] must pass, plus store
//! wrappers used by the service tests: [`CountingStore`] records
//! `select_in` calls and [`FailingStore`] fails every operation.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//! record_store_tests!(InMemoryStore::new());
//! ```

#![allow(dead_code, unused_macros)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use compose::core::entity::{EntityId, Filter, Record};
use compose::core::store::RecordStore;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("record literal must be an object")
}

/// Table name unique to one test run, so backends with shared state do not
/// leak rows between tests
pub fn unique_table(name: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!(
        "{}_{}_{}",
        name,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

// ---------------------------------------------------------------------------
// Contract checks
// ---------------------------------------------------------------------------

pub async fn check_insert_assigns_ids(store: Arc<dyn RecordStore>) -> Result<()> {
    let table = unique_table("items");
    let first = store.insert(&table, record(json!({"name": "a"}))).await?;
    let second = store.insert(&table, record(json!({"name": "b"}))).await?;

    let first_id = EntityId::of(&first).ok_or_else(|| anyhow!("first row has no id"))?;
    let second_id = EntityId::of(&second).ok_or_else(|| anyhow!("second row has no id"))?;
    assert_ne!(first_id, second_id);
    assert_eq!(first["name"], json!("a"));
    Ok(())
}

pub async fn check_explicit_id_is_kept(store: Arc<dyn RecordStore>) -> Result<()> {
    let table = unique_table("items");
    store
        .insert(&table, record(json!({"id": 42, "name": "answer"})))
        .await?;
    let rows = store.select(&table, &Filter::by_id(&EntityId::Int(42))).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("answer"));

    assert!(
        store
            .insert(&table, record(json!({"id": 42, "name": "again"})))
            .await
            .is_err()
    );
    Ok(())
}

pub async fn check_auto_ids_follow_explicit_ids(store: Arc<dyn RecordStore>) -> Result<()> {
    let table = unique_table("items");
    let other = unique_table("other");
    store.insert(&table, record(json!({"id": 5, "name": "five"}))).await?;
    for n in 0..4 {
        store.insert(&other, record(json!({"n": n}))).await?;
    }

    let first = store.insert(&table, record(json!({"name": "next"}))).await?;
    let second = store.insert(&table, record(json!({"name": "after"}))).await?;
    assert_eq!(EntityId::of(&first), Some(EntityId::Int(6)));
    assert_eq!(EntityId::of(&second), Some(EntityId::Int(7)));

    let rows = store.select(&table, &Filter::new()).await?;
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| EntityId::of(row).is_some()));
    Ok(())
}

pub async fn check_select_filters_and_order(store: Arc<dyn RecordStore>) -> Result<()> {
    let table = unique_table("items");
    for (name, kind) in [("a", "book"), ("b", "course"), ("c", "book")] {
        store
            .insert(&table, record(json!({"name": name, "kind": kind})))
            .await?;
    }

    let all = store.select(&table, &Filter::new()).await?;
    let names: Vec<&Value> = all.iter().map(|r| &r["name"]).collect();
    assert_eq!(names, vec![&json!("a"), &json!("b"), &json!("c")]);

    let books = store.select(&table, &Filter::new().eq("kind", "book")).await?;
    assert_eq!(books.len(), 2);

    let missing = store.select(&unique_table("nothing"), &Filter::new()).await?;
    assert!(missing.is_empty());
    Ok(())
}

pub async fn check_select_in(store: Arc<dyn RecordStore>) -> Result<()> {
    let table = unique_table("links");
    for owner in [1, 2, 2, 3] {
        store
            .insert(&table, record(json!({"entityId": owner})))
            .await?;
    }

    let rows = store
        .select_in(&table, "entityId", &[json!(2), json!(3)])
        .await?;
    assert_eq!(rows.len(), 3);
    assert!(store.select_in(&table, "entityId", &[]).await?.is_empty());
    Ok(())
}

pub async fn check_update_merges_patch(store: Arc<dyn RecordStore>) -> Result<()> {
    let table = unique_table("items");
    let row = store
        .insert(&table, record(json!({"name": "a", "price": 10})))
        .await?;
    let id = EntityId::of(&row).ok_or_else(|| anyhow!("row has no id"))?;

    let affected = store
        .update(&table, &id, record(json!({"price": 12, "id": 999})))
        .await?;
    assert_eq!(affected, 1);

    let rows = store.select(&table, &Filter::by_id(&id)).await?;
    assert_eq!(rows[0]["name"], json!("a"));
    assert_eq!(rows[0]["price"], json!(12));
    assert_eq!(EntityId::of(&rows[0]), Some(id));

    let none = store
        .update(&table, &EntityId::Int(12345), record(json!({"price": 1})))
        .await?;
    assert_eq!(none, 0);
    Ok(())
}

pub async fn check_delete_and_count(store: Arc<dyn RecordStore>) -> Result<()> {
    let table = unique_table("links");
    let mut ids = Vec::new();
    for owner in [1, 1, 2] {
        let row = store
            .insert(&table, record(json!({"entityId": owner})))
            .await?;
        ids.extend(EntityId::of(&row));
    }
    assert_eq!(store.count(&table, &Filter::new()).await?, 3);

    assert_eq!(store.delete(&table, &ids[2]).await?, 1);
    assert_eq!(store.delete(&table, &ids[2]).await?, 0);

    let removed = store.delete_where(&table, "entityId", &json!(1)).await?;
    assert_eq!(removed, 2);
    assert_eq!(store.count(&table, &Filter::new()).await?, 0);
    Ok(())
}

/// Generate one `#[tokio::test]` per contract check for a store expression
macro_rules! record_store_tests {
    ($store:expr) => {
        record_store_tests!(@test test_insert_assigns_ids, check_insert_assigns_ids, $store);
        record_store_tests!(@test test_explicit_id_is_kept, check_explicit_id_is_kept, $store);
        record_store_tests!(@test test_auto_ids_follow_explicit_ids, check_auto_ids_follow_explicit_ids, $store);
        record_store_tests!(@test test_select_filters_and_order, check_select_filters_and_order, $store);
        record_store_tests!(@test test_select_in, check_select_in, $store);
        record_store_tests!(@test test_update_merges_patch, check_update_merges_patch, $store);
        record_store_tests!(@test test_delete_and_count, check_delete_and_count, $store);
    };
    (@test $name:ident, $check:ident, $store:expr) => {
        #[tokio::test]
        async fn $name() {
            let store: std::sync::Arc<dyn compose::core::store::RecordStore> =
                std::sync::Arc::new($store);
            store_harness::$check(store).await.unwrap();
        }
    };
}

// ---------------------------------------------------------------------------
// Store wrappers
// ---------------------------------------------------------------------------

/// Delegating store that records every `select_in` call
pub struct CountingStore {
    inner: Arc<dyn RecordStore>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of `select_in` calls against `table`
    pub fn queries_on(&self, table: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == table)
            .count()
    }

    /// Number of values passed to each `select_in` call against `table`
    pub fn batch_sizes(&self, table: &str) -> Vec<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, n)| *n)
            .collect()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>> {
        self.inner.select(table, filter).await
    }

    async fn select_in(&self, table: &str, column: &str, values: &[Value]) -> Result<Vec<Record>> {
        self.calls
            .lock()
            .unwrap()
            .push((table.to_string(), values.len()));
        self.inner.select_in(table, column, values).await
    }

    async fn insert(&self, table: &str, record: Record) -> Result<Record> {
        self.inner.insert(table, record).await
    }

    async fn update(&self, table: &str, id: &EntityId, patch: Record) -> Result<u64> {
        self.inner.update(table, id, patch).await
    }

    async fn delete(&self, table: &str, id: &EntityId) -> Result<u64> {
        self.inner.delete(table, id).await
    }

    async fn delete_where(&self, table: &str, column: &str, value: &Value) -> Result<u64> {
        self.inner.delete_where(table, column, value).await
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        self.inner.count(table, filter).await
    }
}

/// Store whose every operation fails, optionally only for one table
pub struct FailingStore {
    inner: Arc<dyn RecordStore>,
    table: Option<String>,
}

impl FailingStore {
    /// Fail every operation
    pub fn always() -> Self {
        Self {
            inner: Arc::new(compose::storage::InMemoryStore::new()),
            table: None,
        }
    }

    /// Delegate to `inner`, failing only operations on `table`
    pub fn on_table(inner: Arc<dyn RecordStore>, table: &str) -> Self {
        Self {
            inner,
            table: Some(table.to_string()),
        }
    }

    fn check(&self, table: &str) -> Result<()> {
        match &self.table {
            Some(failing) if failing != table => Ok(()),
            _ => Err(anyhow!("connection reset while querying '{}'", table)),
        }
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>> {
        self.check(table)?;
        self.inner.select(table, filter).await
    }

    async fn select_in(&self, table: &str, column: &str, values: &[Value]) -> Result<Vec<Record>> {
        self.check(table)?;
        self.inner.select_in(table, column, values).await
    }

    async fn insert(&self, table: &str, record: Record) -> Result<Record> {
        self.check(table)?;
        self.inner.insert(table, record).await
    }

    async fn update(&self, table: &str, id: &EntityId, patch: Record) -> Result<u64> {
        self.check(table)?;
        self.inner.update(table, id, patch).await
    }

    async fn delete(&self, table: &str, id: &EntityId) -> Result<u64> {
        self.check(table)?;
        self.inner.delete(table, id).await
    }

    async fn delete_where(&self, table: &str, column: &str, value: &Value) -> Result<u64> {
        self.check(table)?;
        self.inner.delete_where(table, column, value).await
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        self.check(table)?;
        self.inner.count(table, filter).await
    }
}
