//! Entity registry for managing resource descriptors and auto-generating CRUD routes

use crate::core::entity::Entity;
use crate::core::service::DataService;
use crate::core::source::DataSource;
use crate::server::handlers::{
    ResourceState, create_resource, delete_resource, get_resource, list_resources,
    update_resource,
};
use axum::{Router, routing::get};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Trait that describes how to build routes for a resource
pub trait EntityDescriptor: Send + Sync {
    /// The entity type name (singular, e.g., "product")
    fn entity_type(&self) -> &str;

    /// The plural form used in URLs (e.g., "products")
    fn plural(&self) -> &str;

    /// Build the routes for this resource
    fn build_routes(&self) -> Router;
}

/// Descriptor exposing the generic CRUD handlers for `T`
///
/// - GET /{plural}
/// - POST /{plural}
/// - GET|PUT|PATCH|DELETE /{plural}/{id}
pub struct CrudDescriptor<T: Entity> {
    service: Arc<DataService<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> CrudDescriptor<T> {
    pub fn new(source: Arc<DataSource>) -> Self {
        Self::from_service(Arc::new(DataService::new(source)))
    }

    pub fn from_service(service: Arc<DataService<T>>) -> Self {
        Self {
            service,
            _marker: PhantomData,
        }
    }

    /// Constructor usable as a plain `fn` pointer by the builder
    pub fn boxed(source: Arc<DataSource>) -> Box<dyn EntityDescriptor> {
        Box::new(Self::new(source))
    }
}

impl<T: Entity> EntityDescriptor for CrudDescriptor<T> {
    fn entity_type(&self) -> &str {
        T::entity_type()
    }

    fn plural(&self) -> &str {
        T::resource_name()
    }

    fn build_routes(&self) -> Router {
        let state = ResourceState {
            service: self.service.clone(),
        };
        let plural = T::resource_name();

        Router::new()
            .route(
                &format!("/{plural}"),
                get(list_resources::<T>).post(create_resource::<T>),
            )
            .route(
                &format!("/{plural}/{{id}}"),
                get(get_resource::<T>)
                    .put(update_resource::<T>)
                    .patch(update_resource::<T>)
                    .delete(delete_resource::<T>),
            )
            .with_state(state)
    }
}

/// Registry for all resources exposed by the server
///
/// Routes are merged in entity type order so the router is deterministic.
#[derive(Default)]
pub struct EntityRegistry {
    descriptors: BTreeMap<String, Box<dyn EntityDescriptor>>,
}

impl EntityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            descriptors: BTreeMap::new(),
        }
    }

    /// Register a descriptor; a second descriptor for the same type replaces the first
    pub fn register(&mut self, descriptor: Box<dyn EntityDescriptor>) {
        let entity_type = descriptor.entity_type().to_string();
        self.descriptors.insert(entity_type, descriptor);
    }

    /// Build a router with all registered resource routes
    pub fn build_routes(&self) -> Router {
        let mut router = Router::new();

        for descriptor in self.descriptors.values() {
            router = router.merge(descriptor.build_routes());
        }

        router
    }

    /// Get all registered entity types
    pub fn entity_types(&self) -> Vec<&str> {
        self.descriptors.keys().map(|s| s.as_str()).collect()
    }

    /// Plural resource names, in the same order as [`Self::entity_types`]
    pub fn plurals(&self) -> Vec<&str> {
        self.descriptors.values().map(|d| d.plural()).collect()
    }
}
