//! Polymorphic components attached to entities through link tables

pub mod merge;
pub mod registry;

pub use merge::ComponentResolver;
pub use registry::{ComponentLink, ComponentMetadata, ComponentRegistry};
