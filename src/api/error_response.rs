//! HTTP error response handling for the API
//!
//! Conversions from domain errors to HTTP responses with status codes and
//! JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DownloadError, StoreError};

    async fn api_error(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_found_renders_envelope() {
        let response = Error::NotFound("Task abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = api_error(response).await;
        assert_eq!(body.error.code, "not_found");
        assert_eq!(body.error.message, "Task abc not found");
    }

    #[tokio::test]
    async fn download_validation_is_bad_request() {
        let response =
            Error::Download(DownloadError::Validation("URL is required".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api_error(response).await.error.message, "URL is required");
    }

    #[tokio::test]
    async fn quota_exceeded_is_internal_error_with_details() {
        let response = Error::Download(DownloadError::QuotaExceeded {
            key_name: "alice".into(),
            requested: 10,
            remaining: 3,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = api_error(response).await;
        assert_eq!(body.error.code, "quota_exceeded");
        assert_eq!(body.error.details.unwrap()["remaining_bytes"], 3);
    }

    #[tokio::test]
    async fn corruption_is_internal_error() {
        let response = Error::Store(StoreError::Corrupted {
            document: "tasks".into(),
            reason: "EOF".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error(response).await.error.code, "data_corruption");
    }

    #[tokio::test]
    async fn no_match_is_not_found() {
        let response = Error::NoMatch.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            api_error(response).await.error.message,
            "No matching parameters"
        );
    }
}
