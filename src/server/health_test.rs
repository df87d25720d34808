//! Tests for the liveness responder

use super::*;
use crate::poller::PollOutcome;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Start the responder on an ephemeral port
///
/// Returns the base URL, the sender that stops the server, and the server task.
async fn start_server(
    readiness: ReadinessState,
) -> (
    String,
    oneshot::Sender<()>,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let metrics = create_metrics().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let handle = tokio::spawn(serve(listener, readiness, metrics, async move {
        let _ = stopped.await;
    }));

    (format!("http://{}", addr), stop, handle)
}

async fn get(url: &str) -> (u16, String) {
    let response = reqwest::Client::new()
        .get(url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to connect to health server");
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_root_returns_ok() {
    let readiness = ReadinessState::new();
    readiness.set_outcome(PollOutcome::Complete { iterations: 1 });
    let (base, stop, handle) = start_server(readiness).await;

    let (status, body) = get(&format!("{}/", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body, "OK");

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

/// The responder answers OK on any path even after the poller gave up
#[tokio::test]
async fn test_any_path_returns_ok_after_exhaustion() {
    let readiness = ReadinessState::new();
    readiness.set_outcome(PollOutcome::Exhausted { iterations: 600 });
    let (base, stop, handle) = start_server(readiness).await;

    for path in ["/", "/status", "/some/nested/path", "/healthz"] {
        let (status, body) = get(&format!("{}{}", base, path)).await;
        assert_eq!(status, 200, "path {}", path);
        assert_eq!(body, "OK", "path {}", path);
    }

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_readyz_returns_200_when_jobs_complete() {
    let readiness = ReadinessState::new();
    readiness.set_outcome(PollOutcome::Complete { iterations: 4 });
    let (base, stop, handle) = start_server(readiness).await;

    let (status, _) = get(&format!("{}/readyz", base)).await;

    assert_eq!(status, 200);

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_readyz_returns_503_when_exhausted() {
    let readiness = ReadinessState::new();
    readiness.set_outcome(PollOutcome::Exhausted { iterations: 600 });
    let (base, stop, handle) = start_server(readiness).await;

    let (status, body) = get(&format!("{}/readyz", base)).await;

    assert_eq!(status, 503);
    assert_eq!(body, NOT_READY_BODY);

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

/// Before the poll loop reports, readiness answers the same 503 body
#[tokio::test]
async fn test_readyz_returns_503_while_pending() {
    let (base, stop, handle) = start_server(ReadinessState::new()).await;

    let (status, body) = get(&format!("{}/readyz", base)).await;

    assert_eq!(status, 503);
    assert_eq!(body, "jobs incomplete");

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text_format() {
    let (base, stop, handle) = start_server(ReadinessState::new()).await;

    let (status, body) = get(&format!("{}/metrics", base)).await;

    assert_eq!(status, 200);
    assert!(body.contains("jobhunter_poll_iterations_total"));

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bind_failure_is_returned() {
    // Hold the port so the second bind fails
    let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let result = run_health_server(
        port,
        ReadinessState::new(),
        create_metrics().unwrap(),
        std::future::pending(),
    )
    .await;

    assert!(result.is_err());
}

#[test]
fn test_readiness_state_transitions() {
    let state = ReadinessState::new();
    assert!(!state.is_ready());

    let cloned = state.clone();
    state.set_outcome(PollOutcome::Exhausted { iterations: 2 });
    assert!(!cloned.is_ready());

    state.set_outcome(PollOutcome::Complete { iterations: 3 });
    assert!(cloned.is_ready());
}
