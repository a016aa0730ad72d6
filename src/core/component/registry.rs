//! Registry of component-bearing properties per entity type
//!
//! Components are registered once at startup through explicit calls and the
//! registry is shared read-only afterwards.

use crate::core::entity::{EntityId, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declares that an entity property is filled from a polymorphic component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    /// Property written on the owning entity
    pub property_key: String,

    /// `field` value of the matching link rows
    pub field: String,

    /// `componentType` discriminator of the matching link rows
    pub component_type: String,

    /// Entity type holding the component rows
    pub target_entity: String,
}

impl ComponentMetadata {
    pub fn new(
        property_key: impl Into<String>,
        field: impl Into<String>,
        component_type: impl Into<String>,
        target_entity: impl Into<String>,
    ) -> Self {
        Self {
            property_key: property_key.into(),
            field: field.into(),
            component_type: component_type.into(),
            target_entity: target_entity.into(),
        }
    }

    /// A requested name selects this component by field or property key
    pub fn matches(&self, name: &str) -> bool {
        self.field == name || self.property_key == name
    }

    /// Whether a link row points at this component
    pub fn links(&self, link: &ComponentLink) -> bool {
        link.component_type == self.component_type && link.field == self.field
    }
}

/// Row of an owner's link table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    pub cmp_id: EntityId,
    pub component_type: String,
    pub field: String,
    #[serde(default)]
    pub order: Option<i64>,
}

impl ComponentLink {
    /// Read a link from a loaded row, skipping rows that are not links
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_record(&self) -> Record {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Record::new(),
        }
    }
}

/// Mapping from entity type to its component metadata
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    entries: HashMap<String, Vec<ComponentMetadata>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append metadata for an entity type. Entries accumulate in
    /// registration order and are never de-duplicated.
    pub fn register(&mut self, entity_type: impl Into<String>, metadata: ComponentMetadata) {
        self.entries
            .entry(entity_type.into())
            .or_default()
            .push(metadata);
    }

    /// All metadata registered for an entity type, empty if none
    pub fn lookup(&self, entity_type: &str) -> &[ComponentMetadata] {
        self.entries
            .get(entity_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_components(&self, entity_type: &str) -> bool {
        !self.lookup(entity_type).is_empty()
    }

    pub fn fields(&self, entity_type: &str) -> Vec<&str> {
        self.lookup(entity_type)
            .iter()
            .map(|m| m.field.as_str())
            .collect()
    }

    pub fn property_keys(&self, entity_type: &str) -> Vec<&str> {
        self.lookup(entity_type)
            .iter()
            .map(|m| m.property_key.as_str())
            .collect()
    }

    /// Whether `name` selects a component of the entity type
    pub fn is_component(&self, entity_type: &str, name: &str) -> bool {
        self.lookup(entity_type).iter().any(|m| m.matches(name))
    }

    /// First metadata entry selected by `name`
    pub fn find(&self, entity_type: &str, name: &str) -> Option<&ComponentMetadata> {
        self.lookup(entity_type).iter().find(|m| m.matches(name))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
