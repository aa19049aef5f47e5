//! Application state for the API server

use crate::{Config, MediaService};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (two `Arc` clones).
#[derive(Clone)]
pub struct AppState {
    /// The media service
    pub service: Arc<MediaService>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<MediaService>) -> Self {
        let config = service.config().clone();
        Self { service, config }
    }
}
