//! Generic data service shared by every resource type
//!
//! A `DataService<T>` orchestrates a request: relation paths become an
//! eager-load tree, the data source runs the query, then the component
//! resolver stitches requested components onto the loaded entities.
//! None of the operations treat a missing row as an error; callers decide
//! whether absence is a 404.

use crate::core::component::{ComponentLink, ComponentResolver};
use crate::core::entity::{Entity, EntityId, Filter, Record};
use crate::core::error::{ApiError, ApiResult, ResourceError};
use crate::core::include::{RelationPath, build_relation_tree, parse_include, parse_include_value};
use crate::core::schema::LINK_OWNER_COLUMN;
use crate::core::source::DataSource;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// CRUD and relation-aware reads for one resource type
pub struct DataService<T: Entity> {
    source: Arc<DataSource>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for DataService<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> DataService<T> {
    pub fn new(source: Arc<DataSource>) -> Self {
        Self {
            source,
            _marker: PhantomData,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Parse a raw include parameter with the configured limits
    pub fn parse_include(&self, raw: Option<&str>) -> ApiResult<Option<Vec<RelationPath>>> {
        Ok(parse_include(raw, self.source.include_options())?)
    }

    /// Parse an include parameter of any JSON shape; only a single string
    /// requests relations
    pub fn parse_include_value(&self, raw: &Value) -> ApiResult<Option<Vec<RelationPath>>> {
        Ok(parse_include_value(raw, self.source.include_options())?)
    }

    // === Relation-aware reads ===

    /// All rows, with the requested relations and components attached
    pub async fn find_all(&self, include: Option<&[RelationPath]>) -> ApiResult<Vec<Record>> {
        self.find_with(&Filter::new(), include).await
    }

    /// One row, with the requested relations and components attached
    pub async fn find_by_id(
        &self,
        id: &EntityId,
        include: Option<&[RelationPath]>,
    ) -> ApiResult<Option<Record>> {
        Ok(self
            .find_with(&Filter::by_id(id), include)
            .await?
            .into_iter()
            .next())
    }

    async fn find_with(
        &self,
        filter: &Filter,
        include: Option<&[RelationPath]>,
    ) -> ApiResult<Vec<Record>> {
        let entity_type = T::entity_type();
        let paths = include.unwrap_or_default();
        let plan = build_relation_tree(paths, entity_type, self.source.schema());

        let mut records = self
            .source
            .find(entity_type, filter, plan.tree.as_ref())
            .await?;

        if plan.tree.is_some() {
            ComponentResolver::new(&self.source)
                .resolve_many(entity_type, &mut records, paths)
                .await?;
        }

        Ok(records)
    }

    // === Typed reads ===

    pub async fn list(&self) -> ApiResult<Vec<T>> {
        self.find_by(&Filter::new()).await
    }

    pub async fn get(&self, id: &EntityId) -> ApiResult<Option<T>> {
        self.find_one_by(&Filter::by_id(id)).await
    }

    pub async fn find_by(&self, filter: &Filter) -> ApiResult<Vec<T>> {
        self.source
            .find(T::entity_type(), filter, None)
            .await?
            .into_iter()
            .map(|record| T::from_record(record).map_err(ApiError::from))
            .collect()
    }

    pub async fn find_one_by(&self, filter: &Filter) -> ApiResult<Option<T>> {
        match self.source.find_one(T::entity_type(), filter, None).await? {
            Some(record) => Ok(Some(T::from_record(record)?)),
            None => Ok(None),
        }
    }

    // === Writes ===

    /// Persist a new entity; the returned copy carries its id and timestamps
    pub async fn create(&self, data: T) -> ApiResult<T> {
        let record = data.to_record()?;
        let stored = self.source.insert(T::entity_type(), record).await?;
        Ok(T::from_record(stored)?)
    }

    /// Apply a partial update, `None` when no row has this id
    pub async fn update(&self, id: &EntityId, patch: Record) -> ApiResult<Option<T>> {
        let affected = self.source.update(T::entity_type(), id, patch).await?;
        if affected == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Delete a row and its component links, `true` when a row was removed
    pub async fn delete(&self, id: &EntityId) -> ApiResult<bool> {
        Ok(self.source.delete(T::entity_type(), id).await? > 0)
    }

    pub async fn exists(&self, id: &EntityId) -> ApiResult<bool> {
        self.exists_by(&Filter::by_id(id)).await
    }

    pub async fn exists_by(&self, filter: &Filter) -> ApiResult<bool> {
        Ok(self.source.count(T::entity_type(), filter).await? > 0)
    }

    pub async fn count(&self, filter: Option<&Filter>) -> ApiResult<u64> {
        let all = Filter::new();
        Ok(self
            .source
            .count(T::entity_type(), filter.unwrap_or(&all))
            .await?)
    }

    // === Components ===

    /// Set the component selected by `property_key` on entity `id`.
    ///
    /// An existing component row is updated in place; otherwise a row is
    /// created in the component table and linked after the existing links.
    /// Returns the component row as stored.
    pub async fn attach_component(
        &self,
        id: &EntityId,
        property_key: &str,
        data: Record,
    ) -> ApiResult<Record> {
        let entity_type = T::entity_type();
        let schema = self.source.schema();
        let unknown = || ResourceError::UnknownComponent {
            entity_type: entity_type.to_string(),
            property: property_key.to_string(),
        };
        let meta = schema
            .components()
            .find(entity_type, property_key)
            .cloned()
            .ok_or_else(unknown)?;
        let links_table = schema
            .component_table(entity_type)
            .ok_or_else(unknown)?
            .to_string();

        if !self.exists(id).await? {
            return Err(ResourceError::not_found(T::label(), id).into());
        }

        let store = self.source.store();
        let owner = Filter::new().eq(LINK_OWNER_COLUMN, id.to_value());
        let existing = store
            .select(
                &links_table,
                &owner
                    .clone()
                    .eq("componentType", meta.component_type.clone())
                    .eq("field", meta.field.clone()),
            )
            .await?
            .into_iter()
            .find_map(|row| ComponentLink::from_value(&Value::Object(row)));

        if let Some(link) = existing {
            let affected = self
                .source
                .update(&meta.target_entity, &link.cmp_id, data.clone())
                .await?;
            if affected > 0 {
                return self
                    .source
                    .find_one(&meta.target_entity, &Filter::by_id(&link.cmp_id), None)
                    .await?
                    .ok_or_else(|| ResourceError::not_found(&meta.target_entity, &link.cmp_id).into());
            }
            // the link points at a deleted row; replace it
            if let Some(link_id) = &link.id {
                store.delete(&links_table, link_id).await?;
            }
        }

        let component = self.source.insert(&meta.target_entity, data).await?;
        let cmp_id = EntityId::of(&component)
            .ok_or_else(|| ApiError::Internal("component stored without id".to_string()))?;
        let order = store.count(&links_table, &owner).await? as i64 + 1;

        let link = ComponentLink {
            id: None,
            entity_id: Some(id.clone()),
            cmp_id,
            component_type: meta.component_type.clone(),
            field: meta.field.clone(),
            order: Some(order),
        };
        store.insert(&links_table, link.to_record()).await?;

        tracing::debug!(
            entity_type,
            %id,
            component = %meta.component_type,
            "component attached"
        );
        Ok(component)
    }
}
