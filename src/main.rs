use clap::Parser;
use jobhunter::config::Args;
use jobhunter::jobs::KubeJobLister;
use jobhunter::poller::{PollOutcome, Poller};
use jobhunter::server::{create_metrics, run_health_server, shutdown_signal, ReadinessState};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Process exit code when `--fail-on-timeout` is set and Jobs never completed
const EXIT_JOBS_INCOMPLETE: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!(
        namespace = %args.namespace,
        labels = args.labels.len(),
        retries = args.retries,
        "Starting jobhunter"
    );

    // kube talks TLS through rustls; pick the provider before building the client
    let _ = rustls::crypto::ring::default_provider().install_default();

    let client = match args.kube_client().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };

    let metrics = create_metrics()?;
    let readiness = ReadinessState::new();

    let lister = Arc::new(KubeJobLister::new(client, args.page_size).with_max_pages(args.max_pages));
    let poller = Poller::new(lister, args.poller_config()).with_metrics(metrics.clone());

    // Registered once: interrupts polling, then drains the server
    let mut signal = Box::pin(shutdown_signal()?);

    let outcome = tokio::select! {
        outcome = poller.run() => outcome,
        signal = &mut signal => {
            info!(signal = signal, "Interrupted while waiting for jobs");
            return Ok(());
        }
    };
    readiness.set_outcome(outcome);

    match outcome {
        PollOutcome::Complete { iterations } => {
            info!(iterations, port = args.port, "Jobs all complete, starting server");
        }
        PollOutcome::Exhausted { iterations } if args.fail_on_timeout => {
            error!(iterations, "Jobs did not complete, exiting");
            std::process::exit(EXIT_JOBS_INCOMPLETE);
        }
        PollOutcome::Exhausted { iterations } => {
            warn!(
                iterations,
                port = args.port,
                "Jobs did not complete, starting server anyway (readyz will report 503)"
            );
        }
    }

    let drained = async move {
        let signal = signal.await;
        info!(signal = signal, "Initiating graceful shutdown");
    };
    if let Err(e) = run_health_server(args.port, readiness, metrics, drained).await {
        error!(error = %e, port = args.port, "Health server failed");
        return Err(e.into());
    }

    info!("jobhunter shut down");
    Ok(())
}
