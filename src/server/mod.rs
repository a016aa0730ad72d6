//! Server module for building HTTP servers with auto-registered routes
//!
//! The `ServerBuilder` collects the data source, configuration and resource
//! types, then exposes:
//! - CRUD routes for every registered resource
//! - health checks
//! - caller supplied custom routes

pub mod builder;
pub mod entity_registry;
pub mod exposure;
pub mod handlers;
pub mod host;

pub use builder::ServerBuilder;
pub use entity_registry::{CrudDescriptor, EntityDescriptor, EntityRegistry};
pub use exposure::RestExposure;
pub use handlers::{ApiResponse, IncludeQuery, ResourceState};
pub use host::ServerHost;
