//! API key management handlers.

use super::{
    CheckPermissionsRequest, CreateKeyRequest, KeyCreated, KeyDeleted, KeyView, MessageResponse,
};
use crate::api::{AppState, JsonBody, auth};
use crate::error::Error;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

/// POST /create_key - Create (or replace) a named key
#[utoipa::path(
    post,
    path = "/create_key",
    tag = "keys",
    request_body = CreateKeyRequest,
    responses(
        (status = 201, description = "Key created", body = KeyCreated),
        (status = 400, description = "Name and permissions required", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn create_key(
    State(state): State<AppState>,
    JsonBody(CreateKeyRequest { name, permissions }): JsonBody<CreateKeyRequest>,
) -> Response {
    let (name, permissions) = match (name, permissions) {
        (Some(name), Some(permissions)) if !name.is_empty() && !permissions.is_empty() => {
            (name, permissions)
        }
        _ => return Error::Validation("Name and permissions required".into()).into_response(),
    };

    match state.service.keys().create(&name, permissions).await {
        Ok(key) => (
            StatusCode::CREATED,
            Json(KeyCreated {
                message: "API key created".into(),
                name,
                key,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /delete_key/:name - Remove a named key
#[utoipa::path(
    delete,
    path = "/delete_key/{name}",
    tag = "keys",
    params(
        ("name" = String, Path, description = "Key name")
    ),
    responses(
        (status = 200, description = "Key deleted", body = KeyDeleted),
        (status = 404, description = "Key not found", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn delete_key(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.service.keys().delete(&name).await {
        Ok(true) => (
            StatusCode::OK,
            Json(KeyDeleted {
                message: "API key deleted".into(),
                name,
            }),
        )
            .into_response(),
        Ok(false) => Error::NotFound("Key".into()).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /get_key/:name - Reveal one key's credential
#[utoipa::path(
    get,
    path = "/get_key/{name}",
    tag = "keys",
    params(
        ("name" = String, Path, description = "Key name")
    ),
    responses(
        (status = 200, description = "The key", body = KeyView),
        (status = 404, description = "Key not found", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn get_key(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.service.keys().get(&name).await {
        Ok(record) => (
            StatusCode::OK,
            Json(KeyView {
                name,
                key: record.key,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /get_keys - List every key with its permissions
#[utoipa::path(
    get,
    path = "/get_keys",
    tag = "keys",
    responses(
        (status = 200, description = "Mapping of key name to {key, permissions}"),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn get_keys(State(state): State<AppState>) -> Response {
    match state.service.keys().list().await {
        Ok(keys) => (StatusCode::OK, Json(keys)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /check_permissions - Test whether the presented key holds permissions
#[utoipa::path(
    post,
    path = "/check_permissions",
    tag = "keys",
    request_body = CheckPermissionsRequest,
    responses(
        (status = 200, description = "Permissions granted", body = MessageResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = MessageResponse)
    ),
    security(("api_key" = []))
)]
pub async fn check_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<JsonBody<CheckPermissionsRequest>, Error>,
) -> Response {
    let keys = state.service.keys();
    let caller = match auth::authenticate(keys, &headers).await {
        Ok(caller) => caller,
        Err(e) => return e.into_response(),
    };
    // Credentials are checked before the body is looked at
    let required = match body {
        Ok(JsonBody(request)) => request.permissions,
        Err(e) => return e.into_response(),
    };

    match keys.has_permissions(&caller.name, required.as_slice()).await {
        Ok(true) => (
            StatusCode::OK,
            Json(MessageResponse::new("Permissions granted")),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::FORBIDDEN,
            Json(MessageResponse::new("Insufficient permissions")),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
