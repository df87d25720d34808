//! Termination signal handling
//!
//! `main` registers the handlers once, races the returned future against the
//! poll loop, and hands the same future to the health server as its
//! graceful-shutdown trigger.

use std::future::Future;
use std::io;

/// Register SIGTERM/SIGINT handlers and return a future that resolves with
/// the name of the first signal received.
///
/// Handlers are installed before this returns, so a signal delivered any
/// time afterwards is observed by the future.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = &'static str> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Ctrl+C variant for non-unix targets
#[cfg(not(unix))]
pub fn shutdown_signal() -> io::Result<impl Future<Output = &'static str> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C listener failed");
            std::future::pending::<()>().await;
        }
        "CTRL_C"
    })
}
