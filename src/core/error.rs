//! Typed error handling for compose-rs
//!
//! Every failure that can reach an HTTP client is expressed as an [`ApiError`].
//! Each category carries its own status code and a stable error code so that
//! clients can match on them instead of parsing messages.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed input (include parameter, ids, bodies)
//! - [`ResourceError`]: missing rows, unknown entity types or components
//! - [`RequestError`]: routing level problems
//! - [`StorageError`]: failures reported by a record store
//! - [`ConfigError`]: configuration loading problems
//!
//! # Example
//!
//! ```rust,ignore
//! use compose::prelude::*;
//!
//! async fn load(service: &DataService<Product>, id: &EntityId) -> ApiResult<Record> {
//!     service
//!         .find_by_id(id, None)
//!         .await?
//!         .ok_or_else(|| ResourceError::not_found("Product", id).into())
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

/// Message sent to clients for every 5xx response
pub const INTERNAL_SERVER_ERROR_MESSAGE: &str = "Internal server error";

/// The main error type of the crate
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Resource lookup errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// HTTP/Request errors
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Storage backend errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body written for every failed request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    pub status_code: u16,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Resource(e) => e.status_code(),
            ApiError::Request(e) => e.status_code(),
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Resource(e) => e.error_code(),
            ApiError::Request(e) => e.error_code(),
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Config(_) => "CONFIG_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            code: self.error_code().to_string(),
            message: self.client_message(),
            status_code: self.status_code().as_u16(),
            details: self.details(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Server errors are reported with a fixed text; the detail only goes
    /// to the log
    fn client_message(&self) -> String {
        if self.status_code().is_server_error() {
            INTERNAL_SERVER_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Resource(ResourceError::NotFound { resource, id }) => {
                Some(serde_json::json!({ "resource": resource, "id": id }))
            }
            ApiError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            ApiError::Validation(ValidationError::TooManyRelations { max, found }) => {
                Some(serde_json::json!({ "max": max, "found": found }))
            }
            ApiError::Validation(ValidationError::MaxDepthExceeded { max, found }) => {
                Some(serde_json::json!({ "max": max, "found": found }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        (status, Json(self.to_response())).into_response()
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The include parameter contains `;`, `'`, `"` or `\`
    #[error(
        "Include parameter contains invalid characters. Only alphanumeric, dots, and underscores are allowed"
    )]
    InvalidIncludeCharacters,

    #[error("Cannot include more than {max} relations at once. Found: {found}")]
    TooManyRelations { max: usize, found: usize },

    #[error(
        "Invalid relation format: '{relation}'. Only alphanumeric characters, dots, and underscores are allowed"
    )]
    InvalidRelationFormat { relation: String },

    #[error("Include depth cannot exceed {max} levels. Found: {found} levels")]
    MaxDepthExceeded { max: usize, found: usize },

    /// Path ids must be positive integers
    #[error("Invalid ID provided: '{value}'")]
    InvalidId { value: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Invalid query string: {message}")]
    InvalidQuery { message: String },

    /// Multiple field validation errors
    #[error("Validation errors: {}", format_field_errors(.0))]
    FieldErrors(Vec<FieldValidationError>),
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

fn format_field_errors(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: wire_field_name(&field),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ValidationError::FieldErrors(fields)
    }
}

/// `validator` names fields after the Rust identifier unless a field-level
/// `#[serde(rename)]` is present; resources serialize camelCase, so the
/// remaining snake_case names are converted to what clients send.
fn wire_field_name(field: &str) -> String {
    let mut name = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' && !name.is_empty() {
            upper = true;
        } else if upper {
            name.extend(c.to_uppercase());
            upper = false;
        } else {
            name.push(c);
        }
    }
    name
}

// =============================================================================
// Resource Errors
// =============================================================================

/// Errors related to resources and their registered schema
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    #[error("Unknown entity type: {entity_type}")]
    UnknownType { entity_type: String },

    #[error("Entity type '{entity_type}' has no component '{property}'")]
    UnknownComponent {
        entity_type: String,
        property: String,
    },
}

impl ResourceError {
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        ResourceError::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn unknown_type(entity_type: impl Into<String>) -> Self {
        ResourceError::UnknownType {
            entity_type: entity_type.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ResourceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResourceError::UnknownType { .. } => StatusCode::BAD_REQUEST,
            ResourceError::UnknownComponent { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::NotFound { .. } => "RESOURCE_NOT_FOUND",
            ResourceError::UnknownType { .. } => "UNKNOWN_ENTITY_TYPE",
            ResourceError::UnknownComponent { .. } => "UNKNOWN_COMPONENT",
        }
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to HTTP requests
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Route {path} not found")]
    RouteNotFound { path: String },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to connect to {backend}: {message}")]
    ConnectionError { backend: String, message: String },

    #[error("{backend} query error: {message}")]
    QueryError { backend: String, message: String },
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config{}: {message}", file_suffix(.file))]
    ParseError {
        file: Option<String>,
        message: String,
    },

    #[error("Invalid value '{value}' for field '{field}': {message}")]
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    #[error("IO error: {message}")]
    IoError { message: String },
}

fn file_suffix(file: &Option<String>) -> String {
    file.as_ref()
        .map(|f| format!(" file '{}'", f))
        .unwrap_or_default()
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.into())
    }
}

impl From<serde_yaml::Error> for ApiError {
    fn from(err: serde_yaml::Error) -> Self {
        ApiError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

/// Record stores report failures through `anyhow`; typed errors raised
/// below the store seam are recovered, everything else is a storage error.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ApiError>() {
            Ok(api) => return api,
            Err(err) => err,
        };
        let err = match err.downcast::<ResourceError>() {
            Ok(resource) => return ApiError::Resource(resource),
            Err(err) => err,
        };
        match err.downcast::<StorageError>() {
            Ok(storage) => ApiError::Storage(storage),
            Err(err) => ApiError::Storage(StorageError::QueryError {
                backend: "store".to_string(),
                message: format!("{:#}", err),
            }),
        }
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_error_messages() {
        assert_eq!(
            ValidationError::TooManyRelations { max: 10, found: 11 }.to_string(),
            "Cannot include more than 10 relations at once. Found: 11"
        );
        assert_eq!(
            ValidationError::MaxDepthExceeded { max: 3, found: 4 }.to_string(),
            "Include depth cannot exceed 3 levels. Found: 4 levels"
        );
        assert!(
            ValidationError::InvalidRelationFormat {
                relation: "a-b".to_string()
            }
            .to_string()
            .contains("'a-b'")
        );
    }

    #[test]
    fn test_not_found_message_and_status() {
        let err: ApiError = ResourceError::not_found("Product", 7).into();
        assert_eq!(err.to_string(), "Product with ID 7 not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "RESOURCE_NOT_FOUND");
    }

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let err: ApiError = ValidationError::InvalidIncludeCharacters.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_field_errors_display_and_details() {
        let err = ApiError::Validation(ValidationError::FieldErrors(vec![
            FieldValidationError {
                field: "name".to_string(),
                message: "required".to_string(),
            },
            FieldValidationError {
                field: "slug".to_string(),
                message: "invalid format".to_string(),
            },
        ]));
        let display = err.to_string();
        assert!(display.contains("name: required"));
        assert!(display.contains("slug: invalid format"));

        let response = err.to_response();
        assert!(!response.success);
        assert_eq!(response.status_code, 400);
        assert_eq!(response.details.unwrap()["fields"][1]["field"], "slug");
    }

    #[test]
    fn test_anyhow_becomes_storage_error() {
        let err: ApiError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_server_errors_hide_details_from_clients() {
        let err: ApiError = anyhow::anyhow!("Access denied for user 'root'@'10.0.0.3'").into();
        let response = err.to_response();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.code, "STORAGE_ERROR");
        assert_eq!(response.message, INTERNAL_SERVER_ERROR_MESSAGE);
        assert!(err.to_string().contains("Access denied"));

        let internal = ApiError::Internal("component stored without id".to_string());
        assert_eq!(internal.to_response().message, INTERNAL_SERVER_ERROR_MESSAGE);

        let not_found: ApiError = ResourceError::not_found("Product", 7).into();
        assert_eq!(not_found.to_response().message, "Product with ID 7 not found");
    }

    #[test]
    fn test_anyhow_keeps_storage_errors() {
        let err: ApiError = anyhow::Error::new(StorageError::ConnectionError {
            backend: "MySQL".to_string(),
            message: "refused".to_string(),
        })
        .into();
        assert!(matches!(
            err,
            ApiError::Storage(StorageError::ConnectionError { .. })
        ));
        assert_eq!(err.to_string(), "Failed to connect to MySQL: refused");
    }

    #[test]
    fn test_field_errors_use_wire_names() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("document_id", validator::ValidationError::new("length"));
        errors.add("SKU", validator::ValidationError::new("length"));
        errors.add("trial_period_days", validator::ValidationError::new("range"));

        let ValidationError::FieldErrors(fields) = ValidationError::from(errors) else {
            panic!("expected field errors");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["SKU", "documentId", "trialPeriodDays"]);
        assert_eq!(wire_field_name("type"), "type");
    }

    #[test]
    fn test_anyhow_keeps_resource_errors() {
        let err: ApiError = anyhow::Error::new(ResourceError::unknown_type("ghost")).into();
        assert_eq!(err.error_code(), "UNKNOWN_ENTITY_TYPE");
    }

    #[test]
    fn test_config_parse_error_mentions_file() {
        let err = ConfigError::ParseError {
            file: Some("app.yaml".to_string()),
            message: "bad indent".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse config file 'app.yaml': bad indent"
        );
    }

    #[test]
    fn test_route_not_found() {
        let err: ApiError = RequestError::RouteNotFound {
            path: "/nope".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Route /nope not found");
    }
}
