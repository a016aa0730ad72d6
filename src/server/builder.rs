//! ServerBuilder for fluent API to build HTTP servers

use super::entity_registry::{CrudDescriptor, EntityDescriptor, EntityRegistry};
use super::exposure::RestExposure;
use super::host::ServerHost;
use crate::config::AppConfig;
use crate::core::entity::Entity;
use crate::core::source::DataSource;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

type DescriptorFactory = fn(Arc<DataSource>) -> Box<dyn EntityDescriptor>;

/// Builder for creating HTTP servers with auto-registered routes
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_data_source(source)
///     .register_resource::<Product>()
///     .register_resource::<Category>()
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    source: Option<Arc<DataSource>>,
    resources: Vec<DescriptorFactory>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder with the default configuration
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            source: None,
            resources: Vec::new(),
            custom_routes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the data source (required)
    pub fn with_data_source(mut self, source: Arc<DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Expose the generic CRUD routes for `T`
    pub fn register_resource<T: Entity>(mut self) -> Self {
        self.resources.push(CrudDescriptor::<T>::boxed);
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for routes that don't fit the CRUD pattern, such as lookups
    /// by a non-id field (`/products/type/{type}`).
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(self) -> Result<ServerHost> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("DataSource is required. Call .with_data_source()"))?;

        let mut registry = EntityRegistry::new();
        for factory in self.resources {
            let descriptor = factory(source.clone());
            if !source.schema().contains(descriptor.entity_type()) {
                anyhow::bail!(
                    "Resource '{}' is not registered in the schema",
                    descriptor.entity_type()
                );
            }
            registry.register(descriptor);
        }

        Ok(ServerHost::new(self.config, source, registry))
    }

    /// Build the final REST router
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        RestExposure::build_router(host, custom_routes)
    }

    /// Serve the application on the configured address with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.bind_address();
        let app = self.build()?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
