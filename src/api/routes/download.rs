//! Synchronous download handler.

use crate::api::{AppState, JsonBody};
use crate::download::DownloadRequest;
use crate::files::{Disposition, content_disposition};
use crate::types::Caller;
use axum::{
    Extension,
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// POST /download - Fetch one item and stream it back
///
/// Blocks until the engine finishes, then streams the produced file as an
/// attachment. The working directory is removed once the body is consumed
/// or the client goes away.
#[utoipa::path(
    post,
    path = "/download",
    tag = "download",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "The downloaded file", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError),
        (status = 500, description = "Quota exceeded or download failed", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn download(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonBody(request): JsonBody<DownloadRequest>,
) -> Response {

    let prepared = match state.service.downloads().run(request, &caller).await {
        Ok(prepared) => prepared,
        Err(e) => return e.into_response(),
    };

    let file_name = prepared.file_name.clone();
    let size = prepared.size;
    let request_id = prepared.request_id.clone();

    let stream = match prepared.into_stream().await {
        Ok(stream) => stream,
        Err(e) => return e.into_response(),
    };

    tracing::info!(
        request_id = %request_id,
        key_name = %caller.name,
        file_name = %file_name,
        size,
        "streaming download"
    );

    let mut response = (StatusCode::OK, Body::from_stream(stream)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime_for_extension(&file_name)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(Disposition::Attachment, &file_name),
    );
    response
}

fn mime_for_extension(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "opus" | "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}
