//! Server host holding the shared application state
//!
//! The host owns everything an exposure needs to serve requests: the data
//! source, the resolved configuration and the resource registry. It does not
//! know about HTTP; [`RestExposure`](super::exposure::RestExposure) turns it
//! into a router.

use crate::config::AppConfig;
use crate::core::source::DataSource;
use crate::server::entity_registry::EntityRegistry;
use std::sync::Arc;

/// Host context containing all framework state
pub struct ServerHost {
    /// Configuration the server was built with
    pub config: Arc<AppConfig>,

    /// Data source shared by every resource service
    pub source: Arc<DataSource>,

    /// Registered resources and their CRUD routes
    pub entity_registry: EntityRegistry,
}

impl ServerHost {
    pub fn new(config: AppConfig, source: Arc<DataSource>, entity_registry: EntityRegistry) -> Self {
        Self {
            config: Arc::new(config),
            source,
            entity_registry,
        }
    }

    /// Get entity types exposed by the host
    pub fn entity_types(&self) -> Vec<&str> {
        self.entity_registry.entity_types()
    }

    /// True once at least one resource is exposed
    pub fn is_ready(&self) -> bool {
        !self.entity_registry.entity_types().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Schema;
    use crate::storage::InMemoryStore;

    fn make_host(registry: EntityRegistry) -> ServerHost {
        let source = DataSource::new(Arc::new(InMemoryStore::new()), Arc::new(Schema::new()));
        ServerHost::new(AppConfig::default(), Arc::new(source), registry)
    }

    #[test]
    fn test_empty_host_is_not_ready() {
        let host = make_host(EntityRegistry::new());
        assert!(host.entity_types().is_empty());
        assert!(!host.is_ready());
    }

    #[test]
    fn test_config_accessible_from_host() {
        let host = make_host(EntityRegistry::new());
        assert_eq!(host.config.server.port, 3000);
    }
}
