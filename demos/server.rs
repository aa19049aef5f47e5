//! REST API server example
//!
//! Runs media-dl with the REST API, reading an optional JSON configuration
//! file given as the first argument.
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:5000/swagger-ui
//! - Queue a metadata task via POST http://localhost:5000/get_info
//! - Poll it via GET http://localhost:5000/status/<task_id>
//!
//! ```bash
//! MEDIA_DL_ADMIN_KEY=change-me RUST_LOG=media_dl=debug cargo run --example server -- config.json
//! ```

use media_dl::api::start_api_server;
use media_dl::{Config, MediaService};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("media_dl=info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Ok(admin_key) = std::env::var("MEDIA_DL_ADMIN_KEY") {
        config.auth.admin_key = Some(admin_key);
    }

    let address = config.server.api.bind_address;
    let service = Arc::new(MediaService::new(config).await?);

    println!("Starting media-dl REST API server");
    println!("Swagger UI: http://{address}/swagger-ui");
    println!();
    println!("Example commands:");
    println!("  # Queue a metadata fetch");
    println!("  curl -X POST http://{address}/get_info \\");
    println!("    -H \"X-API-Key: $MEDIA_DL_ADMIN_KEY\" -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"url\": \"https://www.youtube.com/watch?v=dQw4w9WgXcQ\"}}'");
    println!();
    println!("  # Download and stream a video");
    println!("  curl -X POST http://{address}/download -o video.mp4 \\");
    println!("    -H \"X-API-Key: $MEDIA_DL_ADMIN_KEY\" -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"url\": \"https://www.youtube.com/watch?v=dQw4w9WgXcQ\"}}'");

    start_api_server(service).await?;
    Ok(())
}
