//! Generic HTTP handlers for resource CRUD
//!
//! Every handler is generic over the resource type, so one set of functions
//! serves all registered resources. Responses are wrapped in the
//! `{success, message, data}` envelope; failures go through [`ApiError`].

use crate::core::entity::{Entity, EntityId, ID_FIELD, Record};
use crate::core::error::{ApiError, ApiResult, RequestError, ResourceError, ValidationError};
use crate::core::service::DataService;
use crate::core::source::{CREATED_AT_FIELD, UPDATED_AT_FIELD};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Success envelope shared by every resource route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// `?include=` as it arrived: absent (`Null`), a single string, or an
/// array when the key is repeated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeQuery {
    pub include: Value,
}

impl IncludeQuery {
    const KEY: &'static str = "include";

    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut values: Vec<Value> = pairs
            .into_iter()
            .filter(|(key, _)| key == Self::KEY)
            .map(|(_, value)| Value::String(value))
            .collect();
        let include = match values.len() {
            0 => Value::Null,
            1 => values.remove(0),
            _ => Value::Array(values),
        };
        Self { include }
    }
}

type RawQuery = Result<Query<Vec<(String, String)>>, QueryRejection>;

fn include_query(query: RawQuery) -> ApiResult<IncludeQuery> {
    let Query(pairs) = query.map_err(|rejection| ValidationError::InvalidQuery {
        message: rejection.body_text(),
    })?;
    Ok(IncludeQuery::from_pairs(pairs))
}

/// State handed to the handlers of one resource
pub struct ResourceState<T: Entity> {
    pub service: Arc<DataService<T>>,
}

impl<T: Entity> Clone for ResourceState<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

fn parse_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ValidationError::InvalidJson {
            message: rejection.body_text(),
        }
        .into()
    })
}

/// "products" -> "Products"
fn collection_label<T: Entity>() -> String {
    let mut chars = T::resource_name().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn not_found<T: Entity>(id: &EntityId) -> ApiError {
    ResourceError::not_found(T::label(), id).into()
}

/// GET /{plural}?include=
pub async fn list_resources<T: Entity>(
    State(state): State<ResourceState<T>>,
    query: RawQuery,
) -> ApiResult<Json<ApiResponse<Vec<Record>>>> {
    let query = include_query(query)?;
    let include = state.service.parse_include_value(&query.include)?;
    let records = state.service.find_all(include.as_deref()).await?;

    Ok(Json(ApiResponse::new(
        format!("{} retrieved successfully", collection_label::<T>()),
        records,
    )))
}

/// GET /{plural}/{id}?include=
pub async fn get_resource<T: Entity>(
    State(state): State<ResourceState<T>>,
    Path(raw_id): Path<String>,
    query: RawQuery,
) -> ApiResult<Json<ApiResponse<Record>>> {
    let id = EntityId::parse(&raw_id)?;
    let query = include_query(query)?;
    let include = state.service.parse_include_value(&query.include)?;
    let record = state
        .service
        .find_by_id(&id, include.as_deref())
        .await?
        .ok_or_else(|| not_found::<T>(&id))?;

    Ok(Json(ApiResponse::new(
        format!("{} retrieved successfully", T::label()),
        record,
    )))
}

/// POST /{plural}
pub async fn create_resource<T: Entity>(
    State(state): State<ResourceState<T>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<T>>)> {
    let mut body = parse_body(body)?;
    if let Value::Object(fields) = &mut body {
        fields.remove(ID_FIELD);
    }

    let entity: T = serde_json::from_value(body)?;
    entity.validate()?;
    let created = state.service.create(entity).await?;

    tracing::info!(resource = T::resource_name(), id = ?created.id(), "resource created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            format!("{} created successfully", T::label()),
            created,
        )),
    ))
}

/// PUT|PATCH /{plural}/{id}
///
/// The body is merged over the stored row before deserialization and
/// validation, so both full and partial bodies are accepted.
pub async fn update_resource<T: Entity>(
    State(state): State<ResourceState<T>>,
    Path(raw_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<T>>> {
    let id = EntityId::parse(&raw_id)?;
    let Value::Object(changes) = parse_body(body)? else {
        return Err(ValidationError::InvalidJson {
            message: "Request body must be a JSON object".to_string(),
        }
        .into());
    };

    let mut merged = state
        .service
        .find_by_id(&id, None)
        .await?
        .ok_or_else(|| not_found::<T>(&id))?;
    for (field, value) in changes {
        if field != ID_FIELD {
            merged.insert(field, value);
        }
    }

    let candidate: T = serde_json::from_value(Value::Object(merged))?;
    candidate.validate()?;

    let mut patch = candidate.to_record()?;
    for field in [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD] {
        patch.remove(field);
    }

    let updated = state
        .service
        .update(&id, patch)
        .await?
        .ok_or_else(|| not_found::<T>(&id))?;

    Ok(Json(ApiResponse::new(
        format!("{} updated successfully", T::label()),
        updated,
    )))
}

/// DELETE /{plural}/{id}, answering with the removed row
pub async fn delete_resource<T: Entity>(
    State(state): State<ResourceState<T>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Record>>> {
    let id = EntityId::parse(&raw_id)?;
    let existing = state
        .service
        .find_by_id(&id, None)
        .await?
        .ok_or_else(|| not_found::<T>(&id))?;

    if !state.service.delete(&id).await? {
        return Err(not_found::<T>(&id));
    }

    tracing::info!(resource = T::resource_name(), %id, "resource deleted");
    Ok(Json(ApiResponse::new(
        format!("{} deleted successfully", T::label()),
        existing,
    )))
}

/// Fallback for unmatched routes
pub async fn route_not_found(uri: Uri) -> ApiError {
    RequestError::RouteNotFound {
        path: uri.path().to_string(),
    }
    .into()
}
