#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use procman_api::config::ServerConfig;
use procman_api::render::PlainHtmlRenderer;
use procman_api::router::build_app_router;
use procman_api::state::AppState;
use procman_core::registry::ProcessRegistry;
use procman_db::{JobStore, MemoryJobStore, SqliteJobStore};
use tower::ServiceExt;

pub const BASE_URL: &str = "http://localhost:5000";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        base_url: BASE_URL.to_string(),
        database_url: "sqlite::memory:".to_string(),
        ..ServerConfig::default()
    }
}

/// A router plus the state behind it, so tests can reach the store and
/// wait for background jobs.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Wait for every asynchronous job started so far.
    pub async fn drain_jobs(&self) {
        assert!(
            self.state
                .coordinator
                .shutdown(Duration::from_secs(10))
                .await,
            "background jobs did not finish"
        );
    }
}

fn build_with_store(store: Arc<dyn JobStore>, registry: ProcessRegistry) -> TestApp {
    let config = test_config();
    let state = AppState::new(
        store,
        Arc::new(registry),
        Arc::new(PlainHtmlRenderer),
        &config,
    );

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
    }
}

/// Full application over an in-memory job store and the built-in processes.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack production uses.
pub fn build_test_app() -> TestApp {
    build_with_store(Arc::new(MemoryJobStore::new()), ProcessRegistry::builtin())
}

/// Same as [`build_test_app`] with a custom registry.
pub fn build_test_app_with(registry: ProcessRegistry) -> TestApp {
    build_with_store(Arc::new(MemoryJobStore::new()), registry)
}

/// Full application over an in-memory SQLite job store.
pub async fn build_sqlite_test_app() -> TestApp {
    let store = SqliteJobStore::open("sqlite::memory:")
        .await
        .expect("in-memory sqlite should open");
    build_with_store(Arc::new(store), ProcessRegistry::builtin())
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_with_accept(app: Router, uri: &str, accept: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("accept", accept)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST a raw body, optionally with a `Prefer` header.
pub async fn post_body(
    app: Router,
    uri: &str,
    body: impl Into<Body>,
    prefer: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(prefer) = prefer {
        builder = builder.header("prefer", prefer);
    }
    send(app, builder.body(body.into()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_body(app, uri, body.to_string(), None).await
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Header value as a string, if present.
pub fn header(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .map(|value| value.to_str().unwrap().to_string())
}

/// Job id from a `Location` header.
pub fn job_id_from_location(response: &Response<Body>) -> String {
    let location = header(response, "location").expect("response should carry Location");
    location
        .strip_prefix(&format!("{BASE_URL}/jobs/"))
        .expect("Location should point at the job resource")
        .to_string()
}
