//! REST API exposure
//!
//! Consumes a `ServerHost` and produces an Axum `Router` with health checks,
//! the CRUD routes of every registered resource, custom routes and a JSON
//! 404 fallback.

use super::super::host::ServerHost;
use crate::config::CorsConfig;
use crate::core::error::ConfigError;
use crate::server::handlers::route_not_found;
use anyhow::Result;
use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Custom routes are merged after the resource routes, so a custom route
    /// must not reuse a generated path and method.
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let mut app = Self::health_routes().merge(host.entity_registry.build_routes());

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        tracing::debug!(resources = ?host.entity_registry.plurals(), "REST routes built");

        Ok(app.fallback(route_not_found).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Self::cors_layer(&host.config.cors)?),
        ))
    }

    fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, ConfigError> {
        let layer = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([CONTENT_TYPE]);

        if config.origin == "*" {
            return Ok(layer.allow_origin(Any));
        }

        let origin = config
            .origin
            .parse::<HeaderValue>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "cors.origin".to_string(),
                value: config.origin.clone(),
                message: e.to_string(),
            })?;
        Ok(layer.allow_origin(origin))
    }

    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "compose-rs",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }
}
