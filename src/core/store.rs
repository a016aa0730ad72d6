//! Storage seam: table-level primitives implemented by every backend
//!
//! Backends only know tables of JSON records. Relations, components and
//! timestamps are handled above this trait by the
//! [`DataSource`](crate::core::source::DataSource).

use crate::core::entity::{EntityId, Filter, Record};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Table-level operations a storage backend must provide
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows of `table` matching every condition of `filter`, in insertion order
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>>;

    /// Rows of `table` whose `column` equals any of `values`
    async fn select_in(&self, table: &str, column: &str, values: &[Value]) -> Result<Vec<Record>>;

    /// Insert a row. A row without `id` receives the next integer id.
    ///
    /// Returns the row as stored.
    async fn insert(&self, table: &str, record: Record) -> Result<Record>;

    /// Merge `patch` into the row with `id`, returning the number of rows affected
    async fn update(&self, table: &str, id: &EntityId, patch: Record) -> Result<u64>;

    /// Delete the row with `id`, returning the number of rows affected
    async fn delete(&self, table: &str, id: &EntityId) -> Result<u64>;

    /// Delete every row whose `column` equals `value`
    async fn delete_where(&self, table: &str, column: &str, value: &Value) -> Result<u64>;

    /// Number of rows matching `filter`
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64>;
}
