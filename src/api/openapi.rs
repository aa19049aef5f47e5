//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the media-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "Queue media retrieval tasks, run quota-gated downloads, and serve downloaded files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Tasks
        crate::api::routes::get_video,
        crate::api::routes::get_audio,
        crate::api::routes::get_info,
        crate::api::routes::get_live_video,
        crate::api::routes::get_live_audio,
        crate::api::routes::get_status,

        // Files
        crate::api::routes::get_file,

        // Keys
        crate::api::routes::create_key,
        crate::api::routes::delete_key,
        crate::api::routes::get_key,
        crate::api::routes::get_keys,
        crate::api::routes::check_permissions,

        // Synchronous download
        crate::api::routes::download,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskType,
        crate::types::TaskStatus,
        crate::types::TaskParams,
        crate::types::Timestamp,

        // Download pipeline
        crate::download::DownloadRequest,
        crate::download::MediaKind,

        // Metadata projection
        crate::files::Qualities,
        crate::files::qualities::AudioQuality,
        crate::files::qualities::VideoQuality,

        // API request/response types from routes
        crate::api::routes::TaskCreated,
        crate::api::routes::CreateKeyRequest,
        crate::api::routes::KeyCreated,
        crate::api::routes::KeyDeleted,
        crate::api::routes::KeyView,
        crate::api::routes::CheckPermissionsRequest,
        crate::api::routes::MessageResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "tasks", description = "Tasks - Queue media retrieval work and poll its status"),
        (name = "files", description = "Files - Download directory access and metadata queries"),
        (name = "keys", description = "Keys - Manage API keys and their permissions"),
        (name = "download", description = "Download - Fetch one item synchronously and stream it back"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add API key authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-API-Key"),
                    ),
                ),
            );
        }
    }
}
