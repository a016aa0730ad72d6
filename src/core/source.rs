//! Data source: schema-aware access to a record store
//!
//! The data source resolves entity types to tables, stamps timestamps,
//! cascades component links on delete and eagerly loads the relations named
//! by a [`RelationTree`]. Each relation of a tree level costs one `select_in`
//! (two for many-to-many relations), whatever the number of owners.

use crate::core::entity::{EntityId, Filter, ID_FIELD, Record};
use crate::core::error::ResourceError;
use crate::core::include::{IncludeOptions, RelationNode, RelationTree};
use crate::core::schema::{
    COMPONENTS_RELATION, LINK_OWNER_COLUMN, RelationDef, RelationKind, Schema,
};
use crate::core::store::RecordStore;
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Schema-aware access to a [`RecordStore`]
#[derive(Clone)]
pub struct DataSource {
    store: Arc<dyn RecordStore>,
    schema: Arc<Schema>,
    include: IncludeOptions,
}

impl DataSource {
    pub fn new(store: Arc<dyn RecordStore>, schema: Arc<Schema>) -> Self {
        Self {
            store,
            schema,
            include: IncludeOptions::default(),
        }
    }

    pub fn with_include_options(mut self, include: IncludeOptions) -> Self {
        self.include = include;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn include_options(&self) -> &IncludeOptions {
        &self.include
    }

    /// Table of an entity type, or `UnknownType`
    pub fn table(&self, entity_type: &str) -> Result<&str> {
        self.schema
            .table_for(entity_type)
            .ok_or_else(|| ResourceError::unknown_type(entity_type).into())
    }

    /// Rows of `entity_type` matching `filter`, with `relations` loaded
    pub async fn find(
        &self,
        entity_type: &str,
        filter: &Filter,
        relations: Option<&RelationTree>,
    ) -> Result<Vec<Record>> {
        let table = self.table(entity_type)?;
        let mut records = self.store.select(table, filter).await?;

        if let Some(tree) = relations.filter(|t| !t.is_empty()) {
            self.load_relations(entity_type, &mut records, tree).await?;
        }

        Ok(records)
    }

    /// First row of `entity_type` matching `filter`
    pub async fn find_one(
        &self,
        entity_type: &str,
        filter: &Filter,
        relations: Option<&RelationTree>,
    ) -> Result<Option<Record>> {
        Ok(self
            .find(entity_type, filter, relations)
            .await?
            .into_iter()
            .next())
    }

    /// Rows of `entity_type` whose id is one of `ids`
    pub async fn find_by_ids(&self, entity_type: &str, ids: &[EntityId]) -> Result<Vec<Record>> {
        let table = self.table(entity_type)?;
        let values: Vec<Value> = ids.iter().map(EntityId::to_value).collect();
        self.store.select_in(table, ID_FIELD, &values).await
    }

    /// Insert a row, stamping `createdAt` and `updatedAt`
    pub async fn insert(&self, entity_type: &str, mut record: Record) -> Result<Record> {
        let table = self.table(entity_type)?;
        let now = Value::from(timestamp());
        record.insert(CREATED_AT_FIELD.to_string(), now.clone());
        record.insert(UPDATED_AT_FIELD.to_string(), now);

        let stored = self.store.insert(table, record).await?;
        tracing::debug!(entity_type, id = ?stored.get(ID_FIELD), "inserted");
        Ok(stored)
    }

    /// Apply a partial update, stamping `updatedAt`; `id` and `createdAt`
    /// in the patch are ignored
    pub async fn update(&self, entity_type: &str, id: &EntityId, mut patch: Record) -> Result<u64> {
        let table = self.table(entity_type)?;
        patch.remove(ID_FIELD);
        patch.remove(CREATED_AT_FIELD);
        patch.insert(UPDATED_AT_FIELD.to_string(), Value::from(timestamp()));

        self.store.update(table, id, patch).await
    }

    /// Delete a row and its component links
    pub async fn delete(&self, entity_type: &str, id: &EntityId) -> Result<u64> {
        let table = self.table(entity_type)?;
        let affected = self.store.delete(table, id).await?;

        if affected > 0 {
            if let Some(links) = self.schema.component_table(entity_type) {
                let removed = self
                    .store
                    .delete_where(links, LINK_OWNER_COLUMN, &id.to_value())
                    .await?;
                tracing::debug!(entity_type, %id, removed, "cascaded component links");
            }
        }

        Ok(affected)
    }

    pub async fn count(&self, entity_type: &str, filter: &Filter) -> Result<u64> {
        let table = self.table(entity_type)?;
        self.store.count(table, filter).await
    }

    /// Attach every relation of `tree` to `records`, recursing into nested nodes
    pub fn load_relations<'a>(
        &'a self,
        entity_type: &'a str,
        records: &'a mut [Record],
        tree: &'a RelationTree,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if records.is_empty() {
                return Ok(());
            }

            for (name, node) in tree.iter() {
                let nested = match node {
                    RelationNode::Leaf => None,
                    RelationNode::Nested(sub) => Some(sub),
                };

                if name == COMPONENTS_RELATION {
                    if let Some(links) = self.schema.component_table(entity_type) {
                        self.load_component_links(links, records).await?;
                        continue;
                    }
                }

                let Some(relation) = self.schema.relation(entity_type, name) else {
                    tracing::debug!(entity_type, relation = name, "unknown relation skipped");
                    continue;
                };

                self.load_relation(relation, records, nested).await?;
            }

            Ok(())
        })
    }

    async fn load_relation(
        &self,
        relation: &RelationDef,
        records: &mut [Record],
        nested: Option<&RelationTree>,
    ) -> Result<()> {
        let target_table = self.table(&relation.target)?;
        let name = relation.name.as_str();

        match &relation.kind {
            RelationKind::BelongsTo { foreign_key } => {
                let keys = distinct_values(records.iter().filter_map(|r| r.get(foreign_key)));
                let mut targets = self.store.select_in(target_table, ID_FIELD, &keys).await?;
                self.load_nested(&relation.target, &mut targets, nested).await?;

                let by_id = index_by(targets, ID_FIELD);
                for record in records.iter_mut() {
                    let target = record
                        .get(foreign_key)
                        .and_then(EntityId::from_value)
                        .and_then(|fk| by_id.get(&fk))
                        .and_then(|found| found.first().cloned())
                        .map(Value::Object)
                        .unwrap_or(Value::Null);
                    record.insert(name.to_string(), target);
                }
            }

            RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                let owner_ids = distinct_values(records.iter().filter_map(|r| r.get(ID_FIELD)));
                let mut targets = self
                    .store
                    .select_in(target_table, foreign_key, &owner_ids)
                    .await?;
                self.load_nested(&relation.target, &mut targets, nested).await?;

                let by_owner = index_by(targets, foreign_key);
                let many = relation.kind.is_collection();
                for record in records.iter_mut() {
                    let found = EntityId::of(record)
                        .and_then(|id| by_owner.get(&id))
                        .cloned()
                        .unwrap_or_default();
                    let value = if many {
                        Value::Array(found.into_iter().map(Value::Object).collect())
                    } else {
                        found
                            .into_iter()
                            .next()
                            .map(Value::Object)
                            .unwrap_or(Value::Null)
                    };
                    record.insert(name.to_string(), value);
                }
            }

            RelationKind::ManyToMany {
                join_table,
                owner_key,
                target_key,
            } => {
                let owner_ids = distinct_values(records.iter().filter_map(|r| r.get(ID_FIELD)));
                let pairs = self
                    .store
                    .select_in(join_table, owner_key, &owner_ids)
                    .await?;
                let target_ids = distinct_values(pairs.iter().filter_map(|p| p.get(target_key)));
                let mut targets = self
                    .store
                    .select_in(target_table, ID_FIELD, &target_ids)
                    .await?;
                self.load_nested(&relation.target, &mut targets, nested).await?;

                let by_id = index_by(targets, ID_FIELD);
                let mut by_owner: HashMap<EntityId, Vec<Value>> = HashMap::new();
                for pair in &pairs {
                    let (Some(owner), Some(target)) = (
                        pair.get(owner_key).and_then(EntityId::from_value),
                        pair.get(target_key).and_then(EntityId::from_value),
                    ) else {
                        continue;
                    };
                    if let Some(found) = by_id.get(&target).and_then(|t| t.first()) {
                        by_owner
                            .entry(owner)
                            .or_default()
                            .push(Value::Object(found.clone()));
                    }
                }

                for record in records.iter_mut() {
                    let found = EntityId::of(record)
                        .and_then(|id| by_owner.remove(&id))
                        .unwrap_or_default();
                    record.insert(name.to_string(), Value::Array(found));
                }
            }
        }

        tracing::debug!(relation = name, target = %relation.target, "relation loaded");
        Ok(())
    }

    async fn load_nested(
        &self,
        entity_type: &str,
        targets: &mut [Record],
        nested: Option<&RelationTree>,
    ) -> Result<()> {
        match nested {
            Some(tree) if !tree.is_empty() => {
                self.load_relations(entity_type, targets, tree).await
            }
            _ => Ok(()),
        }
    }

    /// Attach the owner's link rows as the `components` array, ordered by `order`
    async fn load_component_links(&self, links_table: &str, records: &mut [Record]) -> Result<()> {
        let owner_ids = distinct_values(records.iter().filter_map(|r| r.get(ID_FIELD)));
        let mut links = self
            .store
            .select_in(links_table, LINK_OWNER_COLUMN, &owner_ids)
            .await?;
        links.sort_by_key(|link| link.get("order").and_then(Value::as_i64).unwrap_or(i64::MAX));

        let mut by_owner = index_by(links, LINK_OWNER_COLUMN);
        for record in records.iter_mut() {
            let found = EntityId::of(record)
                .and_then(|id| by_owner.remove(&id))
                .unwrap_or_default();
            record.insert(
                COMPONENTS_RELATION.to_string(),
                Value::Array(found.into_iter().map(Value::Object).collect()),
            );
        }

        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Distinct id-like values, first occurrence order
fn distinct_values<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .filter_map(|v| EntityId::from_value(v))
        .filter(|id| seen.insert(id.clone()))
        .map(|id| id.to_value())
        .collect()
}

/// Group records by the id-like value of `column`
fn index_by(records: Vec<Record>, column: &str) -> HashMap<EntityId, Vec<Record>> {
    let mut index: HashMap<EntityId, Vec<Record>> = HashMap::new();
    for record in records {
        if let Some(key) = record.get(column).and_then(EntityId::from_value) {
            index.entry(key).or_default().push(record);
        }
    }
    index
}
