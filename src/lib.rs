//! # Compose-RS
//!
//! A generic REST backend for typed resources whose optional sub-records
//! ("components") are attached through polymorphic link tables.
//!
//! ## Features
//!
//! - **Relation includes**: `?include=categories.products,fullPrice` is parsed,
//!   validated against depth and count limits and eagerly loaded
//! - **Components**: link rows tagged with a component type are resolved into
//!   named properties with one batched query per component kind
//! - **Generic CRUD**: one `DataService<T>` and one set of handlers for every
//!   resource declared with [`impl_resource!`]
//! - **Pluggable storage**: in-memory store, MySQL behind the `mysql` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use compose::prelude::*;
//!
//! impl_resource!(
//!     Product,
//!     "product",
//!     "products",
//!     {
//!         title: String,
//!     }
//! );
//!
//! let mut schema = Schema::new();
//! schema
//!     .register::<Product>()
//!     .component_table("products_cmps")
//!     .component(ComponentMetadata::new("fullPrice", "fullPrice", "product.full-price", "full_price"));
//!
//! let source = Arc::new(DataSource::new(Arc::new(InMemoryStore::new()), Arc::new(schema)));
//! ServerBuilder::new()
//!     .with_data_source(source)
//!     .register_resource::<Product>()
//!     .serve()
//!     .await?;
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod entities;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        component::{ComponentLink, ComponentMetadata, ComponentRegistry, ComponentResolver},
        entity::{Entity, EntityId, Filter, Record},
        error::{ApiError, ApiResult, ResourceError, ValidationError},
        include::{IncludeOptions, RelationPath, RelationTree, build_relation_tree, parse_include},
        schema::{RelationKind, Schema},
        service::DataService,
        source::DataSource,
        store::RecordStore,
    };

    // === Macros ===
    pub use crate::impl_resource;

    // === Storage ===
    pub use crate::storage::InMemoryStore;
    #[cfg(feature = "mysql")]
    pub use crate::storage::MysqlStore;

    // === Config ===
    pub use crate::config::AppConfig;

    // === Server ===
    pub use crate::server::{ApiResponse, EntityDescriptor, EntityRegistry, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;

    // === Axum ===
    pub use axum::{
        Router,
        extract::{Path, State},
        routing::{delete, get, patch, post, put},
    };
}
