//! Internal server tests (/health, /metrics, /pool)
//!
//! The server is bound to an ephemeral port for each test.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use goal_renderer::health::HealthChecker;
use goal_renderer::observability::Metrics;
use goal_renderer::pool::WorkerPool;
use goal_renderer::server::{run_internal_server, InternalState};
use goal_renderer::template::TemplateCache;

use crate::helpers::*;

struct Harness {
    url: String,
    pool: WorkerPool<MockLauncher>,
    state: Arc<MockState>,
    health: Arc<HealthChecker>,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
    _templates: tempfile::TempDir,
}

impl Harness {
    async fn start(capacity: usize) -> Self {
        let dir = template_dir();
        let (pool, mock) = mock_pool(capacity);
        let health = Arc::new(HealthChecker::new("mock"));
        let state = Arc::new(InternalState::new(
            pool.clone(),
            Arc::clone(&health),
            Arc::new(Metrics::new().unwrap()),
            Arc::new(TemplateCache::new(dir.path())),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let (shutdown, rx) = watch::channel(false);
        let server = tokio::spawn(run_internal_server(listener, state, rx));

        Self {
            url: format!("http://{}", addr),
            pool,
            state: mock,
            health,
            shutdown,
            server,
            _templates: dir,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::get(format!("{}{}", self.url, path))
            .await
            .expect("GET request failed")
    }
}

/// Liveness passes on a fresh process and reports JSON
#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::start(2).await;
    let resp = harness.get("/health").await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

/// Readiness and startup follow the lifecycle
#[tokio::test]
async fn test_readiness_follows_startup() {
    let harness = Harness::start(2).await;

    assert_eq!(
        harness.get("/health/ready").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        harness.get("/health/startup").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );

    harness.pool.initialize().await.unwrap();
    harness.health.mark_startup_complete();

    let resp = harness.get("/health/ready").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["details"]["capacity"], 2);
    assert_eq!(body["details"]["engine"], "mock");
    assert_eq!(harness.get("/health/startup").await.status(), StatusCode::OK);

    harness.health.mark_draining();
    assert_eq!(
        harness.get("/health/ready").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

/// Health endpoints answer while the pool is still warming up
#[tokio::test]
async fn test_startup_endpoint_during_warm_up() {
    use goal_renderer::lifecycle::Lifecycle;

    let harness = Harness::start(2).await;
    harness.state.set_launch_delay(Duration::from_millis(300));
    let lifecycle = Lifecycle::new(
        harness.pool.clone(),
        Arc::clone(&harness.health),
        Duration::from_secs(1),
    );

    let warming = tokio::spawn(async move {
        lifecycle.startup().await.unwrap();
        lifecycle
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let resp = harness.get("/health/startup").await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(harness.get("/health").await.status(), StatusCode::OK);

    let lifecycle = warming.await.unwrap();
    assert_eq!(harness.get("/health/startup").await.status(), StatusCode::OK);
    assert!(lifecycle.shutdown().await);
}

/// Liveness fails once the pool is shut down
#[tokio::test]
async fn test_liveness_after_pool_shutdown() {
    let harness = Harness::start(1).await;
    harness.pool.initialize().await.unwrap();
    harness.pool.shutdown().await;

    let resp = harness.get("/health/live").await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// /metrics exposes pool gauges refreshed at scrape time
#[tokio::test]
async fn test_metrics_endpoint() {
    let harness = Harness::start(3).await;
    harness.pool.initialize().await.unwrap();
    let held = harness.pool.acquire().await.unwrap();

    let resp = harness.get("/metrics").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("goal_renderer_pool_workers{state=\"capacity\"} 3"));
    assert!(body.contains("goal_renderer_pool_workers{state=\"borrowed\"} 1"));
    assert!(body.contains("goal_renderer_process_uptime_seconds"));

    held.release().await;
}

/// /pool returns the stats snapshot
#[tokio::test]
async fn test_pool_endpoint() {
    let harness = Harness::start(2).await;
    harness.pool.initialize().await.unwrap();

    let body: serde_json::Value = harness.get("/pool").await.json().await.unwrap();
    assert_eq!(body["capacity"], 2);
    assert_eq!(body["tracked"], 2);
    assert_eq!(body["idle"], 2);
    assert_eq!(body["initialized"], true);
}

/// Unknown paths are 404
#[tokio::test]
async fn test_unknown_path() {
    let harness = Harness::start(1).await;
    assert_eq!(harness.get("/config").await.status(), StatusCode::NOT_FOUND);
}

/// The server returns once the shutdown signal is sent
#[tokio::test]
async fn test_server_stops_on_signal() {
    let harness = Harness::start(1).await;
    assert_eq!(harness.get("/health").await.status(), StatusCode::OK);

    harness.shutdown.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(1), harness.server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
