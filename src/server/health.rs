//! Health, readiness, and metrics endpoints
//!
//! - `/healthz` - Liveness: Is the process alive?
//! - `/readyz` - Readiness: Did the watched Jobs actually complete?
//! - `/metrics` - Prometheus metrics in text format
//! - anything else - `OK`

use crate::poller::PollOutcome;
use crate::server::metrics::SharedMetrics;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Body returned by the liveness responder
pub const OK_BODY: &str = "OK";

/// Body returned by `/readyz` until every watched Job completed
pub const NOT_READY_BODY: &str = "jobs incomplete";

const PENDING: u8 = 0;
const COMPLETE: u8 = 1;
const EXHAUSTED: u8 = 2;

/// Shared state for readiness tracking
///
/// Set once the poll loop has finished, so `/readyz` can tell
/// "jobs completed" apart from "gave up after N retries".
#[derive(Debug, Clone)]
pub struct ReadinessState {
    state: Arc<AtomicU8>,
}

impl ReadinessState {
    /// Create a new readiness state (initially pending)
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// Record how the poll loop ended
    pub fn set_outcome(&self, outcome: PollOutcome) {
        let value = if outcome.is_complete() {
            COMPLETE
        } else {
            EXHAUSTED
        };
        self.state.store(value, Ordering::SeqCst);
    }

    /// True only once every watched Job completed
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::SeqCst) == COMPLETE
    }
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}

/// Combined server state for health and metrics endpoints
#[derive(Clone)]
pub struct ServerState {
    readiness: ReadinessState,
    metrics: SharedMetrics,
}

impl ServerState {
    pub fn new(readiness: ReadinessState, metrics: SharedMetrics) -> Self {
        Self { readiness, metrics }
    }
}

/// Answers every request not routed elsewhere
async fn ok() -> &'static str {
    OK_BODY
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, OK_BODY)
}

/// Readiness probe handler
///
/// Returns 200 OK if all Jobs completed, 503 Service Unavailable if the
/// poller is still running or gave up.
async fn readyz(State(state): State<ServerState>) -> (StatusCode, &'static str) {
    if state.readiness.is_ready() {
        (StatusCode::OK, OK_BODY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, NOT_READY_BODY)
    }
}

async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Build the router for health and metrics endpoints
pub fn build_router(readiness: ReadinessState, metrics: SharedMetrics) -> Router {
    let state = ServerState::new(readiness, metrics);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(self::metrics))
        .fallback(ok)
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    readiness: ReadinessState,
    metrics: SharedMetrics,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(readiness, metrics);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Run the health server on the specified port
///
/// Binds on all interfaces. A bind failure is returned to the caller;
/// otherwise this runs until `shutdown` resolves.
pub async fn run_health_server<F>(
    port: u16,
    readiness: ReadinessState,
    metrics: SharedMetrics,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    // Log after successful bind - server is actually listening
    info!(port = %port, "Health server listening");

    serve(listener, readiness, metrics, shutdown).await
}
