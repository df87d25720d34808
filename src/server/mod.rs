//! HTTP responder started once the poll loop ends
//!
//! Provides Kubernetes probes:
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (watched Jobs completed)
//!
//! SIGTERM/SIGINT drain the server gracefully.

mod health;
pub mod metrics;
pub mod shutdown;

pub use health::{
    build_router, run_health_server, serve, ReadinessState, NOT_READY_BODY, OK_BODY,
};
pub use metrics::{create_metrics, PollMetrics, SharedMetrics};
pub use shutdown::shutdown_signal;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
