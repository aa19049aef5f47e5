//! Task creation and status handlers.

use super::TaskCreated;
use crate::api::{AppState, JsonBody};
use crate::types::{Caller, TaskParams, TaskStatus, TaskType};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

async fn create_task(
    state: AppState,
    task_type: TaskType,
    caller: Caller,
    params: TaskParams,
) -> Response {
    match state.service.tasks().create(task_type, params, &caller).await {
        Ok(task_id) => (
            StatusCode::OK,
            Json(TaskCreated {
                status: TaskStatus::Waiting,
                task_id,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /get_video - Queue a video download
#[utoipa::path(
    post,
    path = "/get_video",
    tag = "tasks",
    request_body = TaskParams,
    responses(
        (status = 200, description = "Task queued", body = TaskCreated),
        (status = 400, description = "URL is required", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn get_video(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonBody(params): JsonBody<TaskParams>,
) -> Response {
    create_task(state, TaskType::GetVideo, caller, params).await
}

/// POST /get_audio - Queue an audio download
#[utoipa::path(
    post,
    path = "/get_audio",
    tag = "tasks",
    request_body = TaskParams,
    responses(
        (status = 200, description = "Task queued", body = TaskCreated),
        (status = 400, description = "URL is required", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn get_audio(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonBody(params): JsonBody<TaskParams>,
) -> Response {
    create_task(state, TaskType::GetAudio, caller, params).await
}

/// POST /get_info - Queue a metadata fetch
#[utoipa::path(
    post,
    path = "/get_info",
    tag = "tasks",
    request_body = TaskParams,
    responses(
        (status = 200, description = "Task queued", body = TaskCreated),
        (status = 400, description = "URL is required", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn get_info(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonBody(params): JsonBody<TaskParams>,
) -> Response {
    create_task(state, TaskType::GetInfo, caller, params).await
}

/// POST /get_live_video - Queue a live video recording
#[utoipa::path(
    post,
    path = "/get_live_video",
    tag = "tasks",
    request_body = TaskParams,
    responses(
        (status = 200, description = "Task queued", body = TaskCreated),
        (status = 400, description = "URL is required", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn get_live_video(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonBody(params): JsonBody<TaskParams>,
) -> Response {
    create_task(state, TaskType::GetLiveVideo, caller, params).await
}

/// POST /get_live_audio - Queue a live audio recording
#[utoipa::path(
    post,
    path = "/get_live_audio",
    tag = "tasks",
    request_body = TaskParams,
    responses(
        (status = 200, description = "Task queued", body = TaskCreated),
        (status = 400, description = "URL is required", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn get_live_audio(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonBody(params): JsonBody<TaskParams>,
) -> Response {
    create_task(state, TaskType::GetLiveAudio, caller, params).await
}

/// GET /status/:id - Get a task record
#[utoipa::path(
    get,
    path = "/status/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "The task record, including fields written by workers"),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn get_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.tasks().get(&id).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(e) => e.into_response(),
    }
}
