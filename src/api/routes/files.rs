//! File serving handler.

use crate::api::AppState;
use crate::files::{Disposition, FileGateway};
use axum::{
    Json,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /files/*path - Serve a file below the download directory
///
/// Files ending in `info.json` are answered as metadata queries: no query
/// parameters returns the document, `qualities` adds the quality summary and
/// any other parameter copies the field of that name. Everything else is
/// streamed with range support, as an attachment unless `raw=true`.
#[utoipa::path(
    get,
    path = "/files/{path}",
    tag = "files",
    params(
        ("path" = String, Path, description = "Path relative to the download directory"),
        ("raw" = Option<bool>, Query, description = "Serve inline instead of as an attachment")
    ),
    responses(
        (status = 200, description = "File contents, or the metadata projection"),
        (status = 206, description = "Partial content for a Range request"),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "File not found, or no matching parameters", body = crate::error::ApiError)
    )
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path(relative): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    request: Request,
) -> Response {
    let files = state.service.files();

    let path = match files.resolve(&relative).await {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(path = %relative, error = %e, "file request refused");
            return e.into_response();
        }
    };

    if FileGateway::is_metadata(&path) {
        return match files.serve_metadata(&path, &params).await {
            Ok(view) => (StatusCode::OK, Json(view)).into_response(),
            Err(e) => e.into_response(),
        };
    }

    let inline = params
        .iter()
        .any(|(name, value)| name == "raw" && value.eq_ignore_ascii_case("true"));
    let disposition = if inline {
        Disposition::Inline
    } else {
        Disposition::Attachment
    };

    match files.serve_raw(&path, disposition, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
