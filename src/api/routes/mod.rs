//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - `tasks` - Task creation and status
//! - `files` - Download directory access and metadata queries
//! - `keys` - API key management
//! - `download` - Synchronous download-and-stream
//! - `system` - Health, OpenAPI

use crate::types::TaskStatus;
use serde::{Deserialize, Serialize};

mod download;
mod files;
mod keys;
mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` continues to work
pub use download::*;
pub use files::*;
pub use keys::*;
pub use system::*;
pub use tasks::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Response body for the task creation routes
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskCreated {
    /// Always `waiting`
    pub status: TaskStatus,
    /// Identifier to poll with `GET /status/{id}`
    pub task_id: String,
}

/// Request body for POST /create_key
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateKeyRequest {
    /// Key name
    #[serde(default)]
    pub name: Option<String>,
    /// Permission names to grant
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// Response body for POST /create_key
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct KeyCreated {
    /// "API key created"
    pub message: String,
    /// Key name
    pub name: String,
    /// The generated credential
    pub key: String,
}

/// Response body for DELETE /delete_key/{name}
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct KeyDeleted {
    /// "API key deleted"
    pub message: String,
    /// Key name
    pub name: String,
}

/// Response body for GET /get_key/{name}
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct KeyView {
    /// Key name
    pub name: String,
    /// The credential
    pub key: String,
}

/// Request body for POST /check_permissions
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CheckPermissionsRequest {
    /// Permission names the caller wants to hold
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Plain `{message}` response
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    /// Outcome
    pub message: String,
}

impl MessageResponse {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
