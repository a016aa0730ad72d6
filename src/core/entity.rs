//! Entity abstractions shared by every resource type
//!
//! Typed resources implement [`Entity`]; everything below the service layer
//! works on untyped [`Record`]s so that relations and components can be
//! attached to a row without changing its Rust type.

use crate::core::error::ValidationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use validator::Validate;

/// A stored row, or a loaded entity with its relations attached
pub type Record = Map<String, Value>;

/// Name of the identifier column in every table
pub const ID_FIELD: &str = "id";

/// Identifier of a row: integer or string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    /// Parse an id taken from a request path.
    ///
    /// Only positive integers are accepted.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(EntityId::Int(id)),
            _ => Err(ValidationError::InvalidId {
                value: raw.to_string(),
            }),
        }
    }

    /// Read an id out of a JSON value (numbers and strings only)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(EntityId::Int),
            Value::String(s) => Some(EntityId::Str(s.clone())),
            _ => None,
        }
    }

    /// Read the `id` field of a record
    pub fn of(record: &Record) -> Option<Self> {
        record.get(ID_FIELD).and_then(Self::from_value)
    }

    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Int(id) => Value::from(*id),
            EntityId::Str(id) => Value::from(id.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{}", id),
            EntityId::Str(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Str(id.to_string())
    }
}

/// Base trait for all typed resources.
///
/// Implementations are usually generated by [`impl_resource!`](crate::impl_resource).
pub trait Entity:
    Serialize + DeserializeOwned + Validate + Clone + Send + Sync + 'static
{
    /// The entity type name used in the schema (e.g., "product")
    fn entity_type() -> &'static str;

    /// The plural resource name used in URLs (e.g., "products")
    fn resource_name() -> &'static str;

    /// Human readable name used in response messages (e.g., "Product")
    fn label() -> &'static str;

    /// Table holding the rows of this entity type
    fn table_name() -> &'static str {
        Self::resource_name()
    }

    /// Get the identifier, if the entity has been persisted
    fn id(&self) -> Option<&EntityId>;

    /// Serialize into a record
    fn to_record(&self) -> anyhow::Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(anyhow::anyhow!(
                "{} did not serialize to an object: {}",
                Self::entity_type(),
                other
            )),
        }
    }

    /// Deserialize from a record, ignoring attached relations the type
    /// does not declare
    fn from_record(record: Record) -> anyhow::Result<Self> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}

/// Equality filter on record fields.
///
/// Numbers are compared numerically so that `1` matches `1.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    conditions: Map<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on `id`
    pub fn by_id(id: &EntityId) -> Self {
        Self::new().eq(ID_FIELD, id.to_value())
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.conditions.iter()
    }

    /// Check whether a record satisfies every condition
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            record
                .get(field)
                .is_some_and(|actual| values_match(actual, expected))
        })
    }
}

/// JSON equality with numeric comparison across integer/float encodings
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}
