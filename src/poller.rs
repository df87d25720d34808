//! Job completion poller
//!
//! Repeatedly counts Jobs for every configured label filter until all of
//! them are complete or the retry budget runs out:
//!
//! ```text
//! POLLING --(all complete)-------> DONE(Complete)
//! POLLING --(retries exhausted)--> DONE(Exhausted)
//! ```

use crate::jobs::{count_completed, JobLister};
use crate::labels::LabelFilter;
use crate::server::SharedMetrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default number of poll iterations
pub const DEFAULT_RETRIES: u32 = 600;

/// Default sleep between poll iterations
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Everything the poller needs, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub namespace: String,
    pub filters: Vec<LabelFilter>,
    pub retries: u32,
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            filters: Vec::new(),
            retries: DEFAULT_RETRIES,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// How the poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every filter reported all of its Jobs complete
    Complete { iterations: u32 },
    /// The retry budget ran out first
    Exhausted { iterations: u32 },
}

impl PollOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, PollOutcome::Complete { .. })
    }

    pub fn iterations(&self) -> u32 {
        match self {
            PollOutcome::Complete { iterations } | PollOutcome::Exhausted { iterations } => {
                *iterations
            }
        }
    }
}

pub struct Poller {
    lister: Arc<dyn JobLister>,
    config: PollerConfig,
    metrics: Option<SharedMetrics>,
}

impl Poller {
    pub fn new(lister: Arc<dyn JobLister>, config: PollerConfig) -> Self {
        Self {
            lister,
            config,
            metrics: None,
        }
    }

    /// Record per-iteration tallies into `metrics`
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Query every filter once
    ///
    /// Returns true only if every filter has `total == completed` and no
    /// query failed. With no filters configured this is vacuously true.
    pub async fn poll_once(&self) -> bool {
        let mut all_complete = true;

        for filter in &self.config.filters {
            match count_completed(self.lister.as_ref(), &self.config.namespace, filter).await {
                Ok(tally) => {
                    info!(
                        selector = %filter,
                        total = tally.total,
                        completed = tally.completed,
                        "Jobs with label"
                    );
                    if let Some(ref metrics) = self.metrics {
                        metrics.record_tally(filter, tally);
                    }
                    if !tally.is_complete() {
                        all_complete = false;
                    }
                }
                Err(e) => {
                    warn!(selector = %filter, error = %e, "Failed to list jobs");
                    if let Some(ref metrics) = self.metrics {
                        metrics.record_error(filter);
                    }
                    all_complete = false;
                }
            }
        }

        all_complete
    }

    /// Poll until all Jobs are complete or `retries` iterations have run
    ///
    /// Sleeps `interval` between iterations, never after the last one.
    pub async fn run(&self) -> PollOutcome {
        let retries = self.config.retries;
        info!(
            namespace = %self.config.namespace,
            filters = self.config.filters.len(),
            retries,
            "Waiting for jobs to complete"
        );

        for iteration in 1..=retries {
            if let Some(ref metrics) = self.metrics {
                metrics.record_iteration();
            }

            if self.poll_once().await {
                info!(iterations = iteration, "All jobs complete");
                if let Some(ref metrics) = self.metrics {
                    metrics.set_all_complete(true);
                }
                return PollOutcome::Complete {
                    iterations: iteration,
                };
            }

            if iteration < retries {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        warn!(retries, "Gave up waiting for jobs to complete");
        PollOutcome::Exhausted {
            iterations: retries,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "poller_test.rs"]
mod tests;
