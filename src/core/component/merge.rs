//! Component merge engine
//!
//! After the main query, entities carry their raw link rows under
//! `components`. The resolver replaces them with the requested component
//! records, one `id IN (...)` query per distinct `(componentType, field)`
//! pair and recursion level. Queries of one level run concurrently.

use crate::core::component::registry::{ComponentLink, ComponentMetadata};
use crate::core::entity::{EntityId, Record};
use crate::core::include::RelationPath;
use crate::core::schema::COMPONENTS_RELATION;
use crate::core::source::DataSource;
use anyhow::Result;
use futures::future::{BoxFuture, try_join_all};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

/// `(componentType, field)`
type PairKey = (String, String);

/// Resolves component links of loaded entities
pub struct ComponentResolver<'a> {
    source: &'a DataSource,
}

impl<'a> ComponentResolver<'a> {
    pub fn new(source: &'a DataSource) -> Self {
        Self { source }
    }

    /// Resolve the components of a single entity
    pub async fn resolve_one(
        &self,
        entity_type: &str,
        record: &mut Record,
        paths: &[RelationPath],
    ) -> Result<()> {
        self.resolve_many(entity_type, std::slice::from_mut(record), paths)
            .await
    }

    /// Resolve the components of `records` selected by `paths`, then descend
    /// into nested relations named by the first segment of longer paths.
    ///
    /// Entities without link rows only lose their `components` array. A
    /// requested component without a matching link or target row is set to
    /// `null`. Query failures abort the whole resolution.
    pub fn resolve_many<'b>(
        &'b self,
        entity_type: &'b str,
        records: &'b mut [Record],
        paths: &'b [RelationPath],
    ) -> BoxFuture<'b, Result<()>> {
        Box::pin(async move {
            if paths.is_empty() {
                strip_links(records);
                return Ok(());
            }

            let registry = self.source.schema().components();
            let requested: Vec<&ComponentMetadata> = registry
                .lookup(entity_type)
                .iter()
                .filter(|meta| {
                    paths
                        .iter()
                        .any(|p| p.first().is_some_and(|first| meta.matches(first)))
                })
                .collect();

            if requested.is_empty() {
                strip_links(records);
            } else {
                let cache = self.fetch_components(entity_type, records, &requested).await?;
                assign_components(records, &requested, &cache);
            }

            self.resolve_nested(entity_type, records, paths).await
        })
    }

    /// One query per distinct pair, all issued concurrently
    async fn fetch_components(
        &self,
        entity_type: &str,
        records: &[Record],
        requested: &[&ComponentMetadata],
    ) -> Result<HashMap<PairKey, HashMap<EntityId, Record>>> {
        let links: Vec<ComponentLink> = records.iter().flat_map(links_of).collect();

        let mut batches: IndexMap<PairKey, (&ComponentMetadata, Vec<EntityId>)> = IndexMap::new();
        for meta in requested {
            let key = (meta.component_type.clone(), meta.field.clone());
            if batches.contains_key(&key) {
                continue;
            }
            let mut ids: Vec<EntityId> = Vec::new();
            for link in links.iter().filter(|l| meta.links(l)) {
                if !ids.contains(&link.cmp_id) {
                    ids.push(link.cmp_id.clone());
                }
            }
            if !ids.is_empty() {
                batches.insert(key, (*meta, ids));
            }
        }

        tracing::debug!(
            entity_type,
            entities = records.len(),
            queries = batches.len(),
            "resolving components"
        );

        let results = try_join_all(batches.into_iter().map(|(key, (meta, ids))| async move {
            let rows = self.source.find_by_ids(&meta.target_entity, &ids).await?;
            let by_id: HashMap<EntityId, Record> = rows
                .into_iter()
                .filter_map(|row| EntityId::of(&row).map(|id| (id, row)))
                .collect();
            Ok::<_, anyhow::Error>((key, by_id))
        }))
        .await?;

        Ok(results.into_iter().collect())
    }

    /// Recurse once per relation named by the first segment of nested paths
    async fn resolve_nested(
        &self,
        entity_type: &str,
        records: &mut [Record],
        paths: &[RelationPath],
    ) -> Result<()> {
        let schema = self.source.schema();

        let mut groups: IndexMap<&str, Vec<RelationPath>> = IndexMap::new();
        for path in paths {
            let (Some(first), Some(tail)) = (path.first(), path.tail()) else {
                continue;
            };
            if schema.components().is_component(entity_type, first) {
                continue;
            }
            groups.entry(first).or_default().push(tail);
        }

        for (relation, tails) in groups {
            let Some(target) = schema.relation_target(entity_type, relation) else {
                tracing::debug!(entity_type, relation, "no relation to descend into");
                continue;
            };

            let mut children = take_children(records, relation);
            if children.is_empty() {
                continue;
            }
            let outcome = self.resolve_many(target, &mut children, &tails).await;
            restore_children(records, relation, children);
            outcome?;
        }

        Ok(())
    }
}

fn links_of(record: &Record) -> Vec<ComponentLink> {
    record
        .get(COMPONENTS_RELATION)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(ComponentLink::from_value).collect())
        .unwrap_or_default()
}

fn strip_links(records: &mut [Record]) {
    for record in records.iter_mut() {
        record.remove(COMPONENTS_RELATION);
    }
}

fn assign_components(
    records: &mut [Record],
    requested: &[&ComponentMetadata],
    cache: &HashMap<PairKey, HashMap<EntityId, Record>>,
) {
    for record in records.iter_mut() {
        let links = links_of(record);
        record.remove(COMPONENTS_RELATION);
        if links.is_empty() {
            continue;
        }

        for meta in requested {
            let key = (meta.component_type.clone(), meta.field.clone());
            let value = links
                .iter()
                .find(|link| meta.links(link))
                .and_then(|link| cache.get(&key).and_then(|rows| rows.get(&link.cmp_id)))
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null);
            record.insert(meta.property_key.clone(), value);
        }
    }
}

/// Move the records nested under `relation` out of their parents, in
/// traversal order
fn take_children(records: &mut [Record], relation: &str) -> Vec<Record> {
    let mut children = Vec::new();
    for record in records.iter_mut() {
        match record.get_mut(relation) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::Object(child) = item {
                        children.push(std::mem::take(child));
                    }
                }
            }
            Some(Value::Object(child)) => children.push(std::mem::take(child)),
            _ => {}
        }
    }
    children
}

/// Inverse of [`take_children`]
fn restore_children(records: &mut [Record], relation: &str, children: Vec<Record>) {
    let mut children = children.into_iter();
    for record in records.iter_mut() {
        match record.get_mut(relation) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::Object(slot) = item {
                        if let Some(child) = children.next() {
                            *slot = child;
                        }
                    }
                }
            }
            Some(Value::Object(slot)) => {
                if let Some(child) = children.next() {
                    *slot = child;
                }
            }
            _ => {}
        }
    }
}
