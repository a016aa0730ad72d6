//! Entity schema: tables, relations and component link tables
//!
//! The schema is assembled once at startup with explicit registration calls
//! and then shared behind an `Arc`. It owns the [`ComponentRegistry`].
//!
//! ```rust,ignore
//! let mut schema = Schema::new();
//! schema
//!     .register::<Product>()
//!     .many_to_many("categories", "category", "products_categories", "productId", "categoryId")
//!     .component_table("products_cmps")
//!     .component(ComponentMetadata::new("fullPrice", "fullPrice", "product.full-price", "full_price"));
//! ```

use crate::core::component::registry::{ComponentMetadata, ComponentRegistry};
use crate::core::entity::Entity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the synthetic relation that loads an owner's component links
pub const COMPONENTS_RELATION: &str = "components";

/// Column of a link table holding the owner id
pub const LINK_OWNER_COLUMN: &str = "entityId";

/// How a relation is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKind {
    /// The owner row holds the target id in `foreign_key`
    BelongsTo { foreign_key: String },

    /// The target row holds the owner id in `foreign_key`, single target
    HasOne { foreign_key: String },

    /// The target rows hold the owner id in `foreign_key`
    HasMany { foreign_key: String },

    /// Rows of `join_table` pair `owner_key` with `target_key`
    ManyToMany {
        join_table: String,
        owner_key: String,
        target_key: String,
    },
}

impl RelationKind {
    /// Whether the relation resolves to a list
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            RelationKind::HasMany { .. } | RelationKind::ManyToMany { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub target: String,
    #[serde(flatten)]
    pub kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity_type: String,
    pub table: String,
    pub relations: Vec<RelationDef>,
    /// Link table holding the component links of this entity type
    pub component_table: Option<String>,
}

impl EntitySchema {
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// Registry of entity types and their components
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: HashMap<String, EntitySchema>,
    components: ComponentRegistry,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed resource under its entity type and table
    pub fn register<T: Entity>(&mut self) -> EntityDef<'_> {
        self.register_type(T::entity_type(), T::table_name())
    }

    /// Register an entity type by name. Registering the same type again
    /// keeps its relations and replaces the table.
    pub fn register_type(
        &mut self,
        entity_type: impl Into<String>,
        table: impl Into<String>,
    ) -> EntityDef<'_> {
        let entity_type = entity_type.into();
        let table = table.into();
        self.entities
            .entry(entity_type.clone())
            .and_modify(|e| e.table = table.clone())
            .or_insert_with(|| EntitySchema {
                entity_type: entity_type.clone(),
                table,
                relations: Vec::new(),
                component_table: None,
            });
        EntityDef {
            schema: self,
            entity_type,
        }
    }

    pub fn entity(&self, entity_type: &str) -> Option<&EntitySchema> {
        self.entities.get(entity_type)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.entities.contains_key(entity_type)
    }

    pub fn table_for(&self, entity_type: &str) -> Option<&str> {
        self.entity(entity_type).map(|e| e.table.as_str())
    }

    pub fn relation(&self, entity_type: &str, name: &str) -> Option<&RelationDef> {
        self.entity(entity_type).and_then(|e| e.relation(name))
    }

    /// Entity type reached by following `name` from `entity_type`
    pub fn relation_target(&self, entity_type: &str, name: &str) -> Option<&str> {
        self.relation(entity_type, name).map(|r| r.target.as_str())
    }

    pub fn component_table(&self, entity_type: &str) -> Option<&str> {
        self.entity(entity_type)
            .and_then(|e| e.component_table.as_deref())
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

/// Builder returned by [`Schema::register`]
pub struct EntityDef<'a> {
    schema: &'a mut Schema,
    entity_type: String,
}

impl EntityDef<'_> {
    fn push(self, name: &str, target: &str, kind: RelationKind) -> Self {
        if let Some(entity) = self.schema.entities.get_mut(&self.entity_type) {
            entity.relations.retain(|r| r.name != name);
            entity.relations.push(RelationDef {
                name: name.to_string(),
                target: target.to_string(),
                kind,
            });
        }
        self
    }

    pub fn belongs_to(self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.push(
            name,
            target,
            RelationKind::BelongsTo {
                foreign_key: foreign_key.to_string(),
            },
        )
    }

    pub fn has_one(self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.push(
            name,
            target,
            RelationKind::HasOne {
                foreign_key: foreign_key.to_string(),
            },
        )
    }

    pub fn has_many(self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.push(
            name,
            target,
            RelationKind::HasMany {
                foreign_key: foreign_key.to_string(),
            },
        )
    }

    pub fn many_to_many(
        self,
        name: &str,
        target: &str,
        join_table: &str,
        owner_key: &str,
        target_key: &str,
    ) -> Self {
        self.push(
            name,
            target,
            RelationKind::ManyToMany {
                join_table: join_table.to_string(),
                owner_key: owner_key.to_string(),
                target_key: target_key.to_string(),
            },
        )
    }

    /// Link table holding this entity's component links
    pub fn component_table(self, table: &str) -> Self {
        if let Some(entity) = self.schema.entities.get_mut(&self.entity_type) {
            entity.component_table = Some(table.to_string());
        }
        self
    }

    /// Declare a component-bearing property
    pub fn component(self, metadata: ComponentMetadata) -> Self {
        self.schema
            .components
            .register(self.entity_type.clone(), metadata);
        self
    }
}
