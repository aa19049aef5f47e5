//! REST API server module
//!
//! Provides an OpenAPI 3 compliant REST API for queueing media tasks,
//! managing API keys, streaming synchronous downloads and serving files.

use crate::types::permissions;
use crate::{MediaService, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod extract;
pub mod openapi;
pub mod routes;
pub mod state;

pub use auth::PermissionGuard;
pub use extract::JsonBody;
pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// Guarded routes carry their own permission layer; the rest are open.
///
/// # Routes
///
/// ## Tasks
/// - `POST /get_video` - Queue a video download (`get_video`)
/// - `POST /get_audio` - Queue an audio download (`get_audio`)
/// - `POST /get_info` - Queue a metadata fetch (`get_info`)
/// - `POST /get_live_video` - Queue a live video recording (`get_live_video`)
/// - `POST /get_live_audio` - Queue a live audio recording (`get_live_audio`)
/// - `GET /status/:id` - Get a task record
///
/// ## Files
/// - `GET /files/*path` - Serve a file or answer a metadata query
///
/// ## Keys
/// - `POST /create_key` - Create a key (`create_key`)
/// - `DELETE /delete_key/:name` - Delete a key (`delete_key`)
/// - `GET /get_key/:name` - Get one key (`get_key`)
/// - `GET /get_keys` - List all keys (`get_keys`)
/// - `POST /check_permissions` - Test the presented key's permissions
///
/// ## Download
/// - `POST /download` - Fetch and stream one item (`get_video`)
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(service: Arc<MediaService>) -> Router {
    let state = AppState::new(service);
    let config = state.config.clone();
    let keys = state.service.keys().clone();

    let guard = |permission: &'static str| {
        middleware::from_fn_with_state(
            PermissionGuard::new(keys.clone(), permission),
            auth::require_permission,
        )
    };

    let router = Router::new()
        // Tasks
        .route(
            "/get_video",
            post(routes::get_video).route_layer(guard(permissions::GET_VIDEO)),
        )
        .route(
            "/get_audio",
            post(routes::get_audio).route_layer(guard(permissions::GET_AUDIO)),
        )
        .route(
            "/get_info",
            post(routes::get_info).route_layer(guard(permissions::GET_INFO)),
        )
        .route(
            "/get_live_video",
            post(routes::get_live_video).route_layer(guard(permissions::GET_LIVE_VIDEO)),
        )
        .route(
            "/get_live_audio",
            post(routes::get_live_audio).route_layer(guard(permissions::GET_LIVE_AUDIO)),
        )
        .route("/status/:id", get(routes::get_status))
        // Files
        .route("/files/*path", get(routes::get_file))
        // Keys
        .route(
            "/create_key",
            post(routes::create_key).route_layer(guard(permissions::CREATE_KEY)),
        )
        .route(
            "/delete_key/:name",
            delete(routes::delete_key).route_layer(guard(permissions::DELETE_KEY)),
        )
        .route(
            "/get_key/:name",
            get(routes::get_key).route_layer(guard(permissions::GET_KEY)),
        )
        .route(
            "/get_keys",
            get(routes::get_keys).route_layer(guard(permissions::GET_KEYS)),
        )
        .route("/check_permissions", post(routes::check_permissions))
        // Synchronous download
        .route(
            "/download",
            post(routes::download).route_layer(guard(permissions::GET_VIDEO)),
        )
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state).
    // SwaggerUi registers its own document route, which must not collide with /openapi.json
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// # Arguments
///
/// * `origins` - List of allowed origins (supports "*" for any origin)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until SIGINT/SIGTERM (Ctrl+C elsewhere), then drains in-flight
/// requests and returns.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaService};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = Arc::new(MediaService::new(Config::default()).await?);
///
/// // Start API server (blocks until shutdown)
/// media_dl::api::start_api_server(service).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(service: Arc<MediaService>) -> Result<()> {
    let bind_address = service.config().server.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(service);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::wait_for_signal())
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
