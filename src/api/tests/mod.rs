use super::*;
use crate::Config;
use crate::download::{EngineRequest, MediaEngine, QuotaGate, UnlimitedQuota};
use crate::error::DownloadError;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot()

mod keys;

const ADMIN_KEY: &str = "admin-secret";

/// Engine that writes `video.<ext>` into the working directory, or fails
struct StubEngine {
    fail: bool,
}

#[async_trait]
impl MediaEngine for StubEngine {
    async fn estimate_size(
        &self,
        _url: &str,
        _video_format: Option<&str>,
        _audio_format: Option<&str>,
    ) -> crate::Result<u64> {
        Ok(11)
    }

    async fn download(&self, request: &EngineRequest) -> crate::Result<()> {
        if self.fail {
            return Err(DownloadError::EngineFailure("ERROR: video unavailable".into()).into());
        }
        let template = request.output_template.to_string_lossy().into_owned();
        let path = template.replace("%(ext)s", &request.output_format);
        tokio::fs::write(path, b"media bytes").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

struct TestApp {
    router: Router,
    service: Arc<MediaService>,
    dir: TempDir,
}

impl TestApp {
    fn download_dir(&self) -> &Path {
        self.service.config().download_dir()
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn post_json(&self, uri: &str, key: Option<&str>, body: Value) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn get(&self, uri: &str, key: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Create a key holding exactly `permissions`
    async fn key_with(&self, name: &str, permissions: &[&str]) -> String {
        self.service
            .keys()
            .create(name, permissions.iter().map(|p| p.to_string()).collect())
            .await
            .unwrap()
    }
}

async fn test_app_with(failing_engine: bool, tweak: impl FnOnce(&mut Config)) -> TestApp {
    build_app(failing_engine, Arc::new(UnlimitedQuota), tweak).await
}

async fn build_app(
    failing_engine: bool,
    quota: Arc<dyn QuotaGate>,
    tweak: impl FnOnce(&mut Config),
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.tasks_file = dir.path().join("data/tasks.json");
    config.storage.keys_file = dir.path().join("data/keys.json");
    config.storage.download_dir = dir.path().join("downloads");
    config.auth.admin_key = Some(ADMIN_KEY.to_string());
    config.server.api.swagger_ui = false;
    tweak(&mut config);

    let service = MediaService::with_collaborators(
        config,
        Arc::new(StubEngine {
            fail: failing_engine,
        }),
        quota,
    )
    .await
    .unwrap();
    let service = Arc::new(service);

    TestApp {
        router: create_router(service.clone()),
        service,
        dir,
    }
}

async fn test_app() -> TestApp {
    test_app_with(false, |_| {}).await
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_openapi_endpoint_lists_routes() {
    let app = test_app().await;

    let response = app.get("/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["paths"]["/download"].is_object());
    assert!(body["paths"]["/status/{id}"].is_object());
}

#[tokio::test]
async fn test_swagger_ui_mounts_without_route_conflict() {
    let app = test_app_with(false, |config| config.server.api.swagger_ui = true).await;

    let response = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_enabled() {
    let app = test_app().await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let app = test_app_with(false, |config| config.server.api.cors_enabled = false).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_api_server_spawns() {
    let app = test_app_with(false, |config| {
        // Port 0 = OS assigns a free port
        config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;

    let handle = tokio::spawn({
        let service = app.service.clone();
        async move { start_api_server(service).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished(), "server exited early");
    handle.abort();
}
