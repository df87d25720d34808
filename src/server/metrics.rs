//! Prometheus metrics for the job poller
//!
//! Exposed on `/metrics` once the responder is running.

use crate::jobs::JobTally;
use crate::labels::LabelFilter;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;

/// Shared handle to the poller metrics
pub type SharedMetrics = Arc<PollMetrics>;

pub struct PollMetrics {
    registry: Registry,
    iterations: IntCounter,
    errors: IntCounterVec,
    jobs_total: IntGaugeVec,
    jobs_completed: IntGaugeVec,
    all_complete: IntGauge,
}

impl PollMetrics {
    /// Create and register all poller metrics in a private registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let iterations = IntCounter::new(
            "jobhunter_poll_iterations_total",
            "Number of poll iterations run",
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                "jobhunter_poll_errors_total",
                "Number of failed job listings per selector",
            ),
            &["selector"],
        )?;
        let jobs_total = IntGaugeVec::new(
            Opts::new(
                "jobhunter_jobs_total",
                "Jobs matching the selector at the last poll",
            ),
            &["selector"],
        )?;
        let jobs_completed = IntGaugeVec::new(
            Opts::new(
                "jobhunter_jobs_completed",
                "Completed jobs matching the selector at the last poll",
            ),
            &["selector"],
        )?;
        let all_complete = IntGauge::new(
            "jobhunter_jobs_complete",
            "1 once every selector reported all jobs complete",
        )?;

        registry.register(Box::new(iterations.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(jobs_total.clone()))?;
        registry.register(Box::new(jobs_completed.clone()))?;
        registry.register(Box::new(all_complete.clone()))?;

        Ok(Self {
            registry,
            iterations,
            errors,
            jobs_total,
            jobs_completed,
            all_complete,
        })
    }

    pub fn record_iteration(&self) {
        self.iterations.inc();
    }

    pub fn record_tally(&self, filter: &LabelFilter, tally: JobTally) {
        let selector = filter.selector();
        self.jobs_total
            .with_label_values(&[selector.as_str()])
            .set(tally.total as i64);
        self.jobs_completed
            .with_label_values(&[selector.as_str()])
            .set(tally.completed as i64);
    }

    pub fn record_error(&self, filter: &LabelFilter) {
        self.errors
            .with_label_values(&[filter.selector().as_str()])
            .inc();
    }

    pub fn set_all_complete(&self, complete: bool) {
        self.all_complete.set(i64::from(complete));
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        prometheus::TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Create the shared metrics handle
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(PollMetrics::new()?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_recorded_tally() {
        let metrics = create_metrics().unwrap();
        let filter = LabelFilter::new("app", "worker");

        metrics.record_iteration();
        metrics.record_tally(&filter, JobTally { total: 4, completed: 3 });
        metrics.record_error(&filter);

        let text = metrics.encode().unwrap();
        assert!(text.contains("jobhunter_poll_iterations_total 1"));
        assert!(text.contains(r#"jobhunter_jobs_total{selector="app=worker"} 4"#));
        assert!(text.contains(r#"jobhunter_jobs_completed{selector="app=worker"} 3"#));
        assert!(text.contains(r#"jobhunter_poll_errors_total{selector="app=worker"} 1"#));
    }

    #[test]
    fn test_all_complete_gauge() {
        let metrics = create_metrics().unwrap();
        assert!(metrics.encode().unwrap().contains("jobhunter_jobs_complete 0"));

        metrics.set_all_complete(true);
        assert!(metrics.encode().unwrap().contains("jobhunter_jobs_complete 1"));
    }
}
