//! Internal HTTP server for health, metrics and pool endpoints.
//!
//! | Path | Response |
//! |------|----------|
//! | `/health`, `/health/live` | Liveness probe |
//! | `/health/ready` | Readiness probe |
//! | `/health/startup` | Startup probe |
//! | `/metrics` | Prometheus text exposition |
//! | `/pool` | [`PoolStats`] as JSON |
//!
//! Probes answer 200 when healthy and 503 otherwise.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http_body_util::Full;
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::engine::WorkerLauncher;
use crate::health::{HealthChecker, ProbeType};
use crate::observability::Metrics;
use crate::pool::{PoolStats, WorkerPool};
use crate::template::TemplateCache;

const JSON: &str = "application/json";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Everything the internal endpoints read from.
pub struct InternalState {
    health: Arc<HealthChecker>,
    metrics: Arc<Metrics>,
    templates: Arc<TemplateCache>,
    pool_stats: Box<dyn Fn() -> PoolStats + Send + Sync>,
}

impl InternalState {
    pub fn new<L: WorkerLauncher>(
        pool: WorkerPool<L>,
        health: Arc<HealthChecker>,
        metrics: Arc<Metrics>,
        templates: Arc<TemplateCache>,
    ) -> Self {
        Self {
            health,
            metrics,
            templates,
            pool_stats: Box::new(move || pool.stats()),
        }
    }

    fn stats(&self) -> PoolStats {
        (self.pool_stats)()
    }
}

/// Serve internal endpoints until `shutdown` flips to `true` (or its sender drops).
pub async fn run_internal_server(
    listener: TcpListener,
    state: Arc<InternalState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "internal server listening");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let _ = stream.set_nodelay(true);
                let state = Arc::clone(&state);

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_internal_request(req, state).await }
                    });

                    let io = TokioIo::new(stream);
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("internal server received shutdown signal");
                    return Ok(());
                }
            }
        }
    }
}

/// Handle internal server requests.
async fn handle_internal_request(
    req: Request<IncomingBody>,
    state: Arc<InternalState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/health" | "/health/live" => probe(&state, ProbeType::Liveness),
        "/health/ready" => probe(&state, ProbeType::Readiness),
        "/health/startup" => probe(&state, ProbeType::Startup),
        "/metrics" => {
            let stats = state.stats();
            let (hits, misses) = state.templates.stats();
            state.metrics.update_pool(&stats);
            state.metrics.update_template_cache(hits, misses);
            state
                .metrics
                .update_uptime(state.health.uptime().as_secs_f64());
            respond(StatusCode::OK, PROMETHEUS_TEXT, state.metrics.export())
        }
        "/pool" => {
            let body = serde_json::to_string(&state.stats()).unwrap_or_else(|_| "{}".to_string());
            respond(StatusCode::OK, JSON, body)
        }
        _ => respond(
            StatusCode::NOT_FOUND,
            "text/plain",
            "Not Found\n".to_string(),
        ),
    };

    Ok(response)
}

fn probe(state: &InternalState, probe: ProbeType) -> Response<Full<Bytes>> {
    let status = state.health.check(probe, &state.stats());
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::to_string(&status).unwrap_or_else(|_| "{}".to_string());
    respond(code, JSON, body)
}

fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
