//! Configuration loading and management
//!
//! Settings come from a YAML document; a handful of environment variables
//! override individual keys afterwards.

use crate::core::error::ConfigError;
use crate::core::include::IncludeOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Allowed CORS origin; `*` allows any origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Persistent backend; the in-memory store is used when `url` is unset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub include: IncludeOptions,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    /// Insert the demo catalog on startup
    pub seed: bool,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::parse(&content, Some(path.display().to_string()))
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, None)
    }

    fn parse(yaml: &str, file: Option<String>) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
            file,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT`, `LOG_LEVEL`, `CORS_ORIGIN` and `DATABASE_URL`
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, so tests need not touch the
    /// process environment
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PORT".to_string(),
                value: port.clone(),
                message: "not a valid port".to_string(),
            })?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(origin) = lookup("CORS_ORIGIN") {
            self.cors.origin = origin;
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|url| !url.is_empty()) {
            self.database.url = Some(url);
        }
        self.validate()?;
        Ok(self)
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let include = &self.include;
        if include.max_depth == 0 {
            return Err(invalid("include.max_depth", 0, "must be at least 1"));
        }
        if include.max_relations == 0 {
            return Err(invalid("include.max_relations", 0, "must be at least 1"));
        }
        if include.separator == include.nested_separator {
            return Err(invalid(
                "include.nested_separator",
                include.nested_separator,
                "must differ from include.separator",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}
