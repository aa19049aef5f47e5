//! # media-dl
//!
//! HTTP service for queueing media retrieval tasks, running quota-gated
//! synchronous downloads through yt-dlp, and serving the download directory.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - the API server is one consumer of [`MediaService`]
//! - **Shared-file persistence** - tasks and keys live in two JSON documents
//!   that external workers read and write under advisory locks
//! - **Pluggable collaborators** - the media engine and the quota gate are
//!   traits, with yt-dlp and an in-memory byte budget as the defaults
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, MediaService, TaskParams, TaskType};
//! use media_dl::types::Caller;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = MediaService::new(Config::default()).await?;
//!
//!     let caller = Caller { name: "admin".into(), api_key: "secret".into() };
//!     let params = TaskParams {
//!         url: Some("https://example.com/watch?v=1".into()),
//!         ..Default::default()
//!     };
//!     let task_id = service.tasks().create(TaskType::GetInfo, params, &caller).await?;
//!     println!("queued {task_id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Synchronous download pipeline
pub mod download;
/// Error types
pub mod error;
/// Download directory access and metadata queries
pub mod files;
/// API key registry
pub mod keys;
/// Service facade
pub mod service;
/// Locked JSON document persistence
pub mod store;
/// Task registry
pub mod tasks;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use download::{DownloadOrchestrator, DownloadRequest, MediaEngine, QuotaGate, YtDlpEngine};
pub use error::{ApiError, DownloadError, Error, ErrorDetail, Result, StoreError, ToHttpStatus};
pub use files::FileGateway;
pub use keys::KeyRegistry;
pub use service::MediaService;
pub use store::DocumentStore;
pub use tasks::TaskRegistry;
pub use types::{Caller, KeyRecord, Task, TaskParams, TaskStatus, TaskType, Timestamp};

/// Resolves on SIGTERM or SIGINT (Ctrl+C where Unix signals are unavailable)
#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
