//! Tests for termination signal handling

use super::shutdown::*;
use std::time::Duration;

/// Handlers are live as soon as `shutdown_signal` returns; the future stays
/// pending until a signal arrives and then reports which one.
///
/// Kept as a single test: a SIGTERM reaches every registered listener in
/// the process, so a parallel "stays pending" test would race with it.
#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_signal_resolves_on_sigterm() {
    let signal = shutdown_signal().expect("register signal handlers");
    tokio::pin!(signal);

    let early = tokio::time::timeout(Duration::from_millis(50), &mut signal).await;
    assert!(early.is_err(), "no signal sent yet");

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .expect("run kill");
    assert!(status.success());

    let received = tokio::time::timeout(Duration::from_secs(5), &mut signal)
        .await
        .expect("signal future should resolve after SIGTERM");
    assert_eq!(received, "SIGTERM");
}
