//! Relation tree handed to the data source for eager loading
//!
//! Precedence between leaves and nested nodes is fixed: a nested node is
//! never downgraded by a later leaf for the same key, and an existing leaf
//! is upgraded when a deeper path arrives. Building is therefore independent
//! of path order and idempotent.

use crate::core::include::parser::RelationPath;
use crate::core::schema::{COMPONENTS_RELATION, Schema};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One node of a [`RelationTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationNode {
    /// Load the relation
    Leaf,
    /// Load the relation and continue with its own relations
    Nested(RelationTree),
}

/// Ordered mapping from relation name to node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationTree {
    nodes: IndexMap<String, RelationNode>,
}

impl RelationTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, name: &str) -> Option<&RelationNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationNode)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mark `name` as loaded unless a node already exists
    pub fn insert_leaf(&mut self, name: &str) {
        self.nodes
            .entry(name.to_string())
            .or_insert(RelationNode::Leaf);
    }

    /// Descend into `name`, upgrading a leaf to a nested node
    pub fn descend(&mut self, name: &str) -> &mut RelationTree {
        let node = self
            .nodes
            .entry(name.to_string())
            .or_insert(RelationNode::Leaf);
        if let RelationNode::Leaf = node {
            *node = RelationNode::Nested(RelationTree::new());
        }
        match node {
            RelationNode::Nested(tree) => tree,
            RelationNode::Leaf => unreachable!("leaf upgraded above"),
        }
    }

    /// Insert a plain path, without schema awareness
    pub fn insert_path<S: AsRef<str>>(&mut self, segments: &[S]) {
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut node = self;
        for segment in parents {
            node = node.descend(segment.as_ref());
        }
        node.insert_leaf(last.as_ref());
    }

    /// JSON rendition: leaves are `true`, nested nodes are objects
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl Serialize for RelationTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (name, node) in &self.nodes {
            match node {
                RelationNode::Leaf => map.serialize_entry(name, &true)?,
                RelationNode::Nested(tree) => map.serialize_entry(name, tree)?,
            }
        }
        map.end()
    }
}

/// Result of [`build_relation_tree`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationPlan {
    /// Relations to eager-load, `None` when nothing needs loading
    pub tree: Option<RelationTree>,

    /// Whether any path selected a component
    pub components_requested: bool,
}

/// Build the eager-load tree for `paths` requested on `entity_type`.
///
/// Segments naming a registered component of the entity type reached at
/// that level are replaced by the synthetic `components` relation and end
/// the path. Segments matching no component pass through unchanged; below a
/// segment unknown to the schema, no component detection happens.
pub fn build_relation_tree(
    paths: &[RelationPath],
    entity_type: &str,
    schema: &Schema,
) -> RelationPlan {
    let mut root = RelationTree::new();
    let mut components_requested = false;

    for path in paths {
        let segments = path.segments();
        let mut node = &mut root;
        let mut current: Option<&str> = Some(entity_type);

        for (i, segment) in segments.iter().enumerate() {
            if current.is_some_and(|t| schema.components().is_component(t, segment)) {
                components_requested = true;
                node.insert_leaf(COMPONENTS_RELATION);
                break;
            }

            if i + 1 == segments.len() {
                node.insert_leaf(segment);
            } else {
                current = current.and_then(|t| schema.relation_target(t, segment));
                node = node.descend(segment);
            }
        }
    }

    RelationPlan {
        tree: (!root.is_empty()).then_some(root),
        components_requested,
    }
}
