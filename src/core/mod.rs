//! Core module containing the data model, include handling, component
//! resolution and the generic data service

pub mod component;
pub mod entity;
pub mod error;
pub mod include;
pub mod schema;
pub mod service;
pub mod source;
pub mod store;

pub use component::{ComponentLink, ComponentMetadata, ComponentRegistry, ComponentResolver};
pub use entity::{Entity, EntityId, Filter, Record};
pub use error::{ApiError, ApiResult};
pub use include::{IncludeOptions, RelationPath, RelationTree, parse_include};
pub use schema::{RelationKind, Schema};
pub use service::DataService;
pub use source::DataSource;
pub use store::RecordStore;
