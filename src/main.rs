//! Catalog API server
//!
//! Configuration is read from the YAML file named by `CONFIG_PATH` (when
//! set), then `PORT`, `LOG_LEVEL`, `CORS_ORIGIN` and `DATABASE_URL` override
//! individual keys.

use anyhow::Result;
use compose::catalog::{self, Category, Product};
use compose::config::AppConfig;
use compose::core::service::DataService;
use compose::core::source::DataSource;
use compose::core::store::RecordStore;
use compose::server::ServerBuilder;
use compose::storage::InMemoryStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = open_store(&config).await?;
    let source = Arc::new(
        DataSource::new(store, Arc::new(catalog::schema()))
            .with_include_options(config.include.clone()),
    );

    if config.seed {
        catalog::seed(source.clone()).await?;
    }

    let products = Arc::new(DataService::<Product>::new(source.clone()));

    ServerBuilder::new()
        .with_config(config)
        .with_data_source(source)
        .register_resource::<Product>()
        .register_resource::<Category>()
        .with_custom_routes(catalog::routes(products))
        .serve()
        .await
}

fn load_config() -> Result<AppConfig> {
    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => AppConfig::from_yaml_file(path)?,
        Err(_) => AppConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

#[cfg(feature = "mysql")]
async fn open_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    use compose::storage::MysqlStore;

    match &config.database.url {
        Some(url) => {
            tracing::info!("using MySQL store");
            Ok(Arc::new(MysqlStore::connect(url).await?))
        }
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

#[cfg(not(feature = "mysql"))]
async fn open_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    if config.database.url.is_some() {
        tracing::warn!("database.url is set but the mysql feature is disabled; using the in-memory store");
    }
    Ok(Arc::new(InMemoryStore::new()))
}
