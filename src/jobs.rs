//! Job listing and completion counting
//!
//! `JobLister` is the seam to the Kubernetes API. Production code uses
//! `KubeJobLister`; tests use `MockJobLister` with scripted responses.

use crate::labels::LabelFilter;
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, ListParams};
use kube::Client;
use thiserror::Error;
use tracing::{debug, info};

/// Job condition type set by the Job controller once all pods succeeded
pub const JOB_COMPLETE: &str = "Complete";

/// Default upper bound on pages followed for a single listing
pub const DEFAULT_MAX_PAGES: usize = 1000;

#[derive(Debug, Error)]
pub enum JobsError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Job listing did not finish after {0} pages")]
    TooManyPages(usize),
}

/// Trait for listing Jobs by label selector
#[async_trait]
pub trait JobLister: Send + Sync {
    /// List Jobs in `namespace` matching `label_selector`.
    ///
    /// An empty namespace lists Jobs across all namespaces.
    async fn list_jobs(&self, namespace: &str, label_selector: &str)
        -> Result<Vec<Job>, JobsError>;
}

/// Production lister backed by the Kubernetes API
pub struct KubeJobLister {
    client: Client,
    page_size: u32,
    max_pages: usize,
}

impl KubeJobLister {
    pub fn new(client: Client, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Give up on a listing whose `continue` token never runs out
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    fn api(&self, namespace: &str) -> Api<Job> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

#[async_trait]
impl JobLister for KubeJobLister {
    async fn list_jobs(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Job>, JobsError> {
        let api = self.api(namespace);
        let mut params = ListParams::default()
            .labels(label_selector)
            .limit(self.page_size);
        let mut jobs = Vec::new();

        for page in 1..=self.max_pages {
            let list = api.list(&params).await?;
            jobs.extend(list.items);

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(page, selector = %label_selector, "Following list continue token");
                    params = params.continue_token(&token);
                }
                _ => return Ok(jobs),
            }
        }

        Err(JobsError::TooManyPages(self.max_pages))
    }
}

/// Result of counting Jobs for one label filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobTally {
    pub total: usize,
    pub completed: usize,
}

impl JobTally {
    pub fn is_complete(&self) -> bool {
        self.total == self.completed
    }
}

/// Check whether a Job carries a `Complete` condition
pub fn is_job_complete(job: &Job) -> bool {
    job.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| conditions.iter().any(|c| c.type_ == JOB_COMPLETE))
}

/// Count total and completed Jobs
///
/// Each Job counts at most once, so `completed <= total` always holds.
pub fn tally_jobs(jobs: &[Job]) -> JobTally {
    JobTally {
        total: jobs.len(),
        completed: jobs.iter().filter(|job| is_job_complete(job)).count(),
    }
}

/// Query Jobs for one label filter and tally them
///
/// Errors from the lister propagate; retrying is the caller's job.
pub async fn count_completed(
    lister: &dyn JobLister,
    namespace: &str,
    filter: &LabelFilter,
) -> Result<JobTally, JobsError> {
    let jobs = lister.list_jobs(namespace, &filter.selector()).await?;
    info!(
        selector = %filter,
        namespace = %namespace,
        discovered = jobs.len(),
        "Discovered jobs"
    );
    Ok(tally_jobs(&jobs))
}

/// Build a Job with the given condition types (test helper)
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub fn job_with_conditions(name: &str, condition_types: &[&str]) -> Job {
    let conditions: Vec<serde_json::Value> = condition_types
        .iter()
        .map(|t| serde_json::json!({ "type": t, "status": "True" }))
        .collect();

    serde_json::from_value(serde_json::json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": { "name": name },
        "status": { "conditions": conditions }
    }))
    .unwrap()
}

#[cfg(test)]
type ListFn = dyn Fn(usize, &str) -> Result<Vec<Job>, JobsError> + Send + Sync;

/// Mock lister for testing - answers from a script and records calls
#[cfg(test)]
pub struct MockJobLister {
    respond: Box<ListFn>,
    calls: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockJobLister {
    /// `respond` receives the zero-based call index and the label selector
    pub fn new(
        respond: impl Fn(usize, &str) -> Result<Vec<Job>, JobsError> + Send + Sync + 'static,
    ) -> Self {
        MockJobLister {
            respond: Box::new(respond),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Recorded `(namespace, selector)` pairs in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl JobLister for MockJobLister {
    async fn list_jobs(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Job>, JobsError> {
        let index = {
            #[allow(clippy::unwrap_used)]
            let mut calls = self.calls.lock().unwrap();
            calls.push((namespace.to_string(), label_selector.to_string()));
            calls.len() - 1
        };
        (self.respond)(index, label_selector)
    }
}

/// A transport error as returned by the Kubernetes client (test helper)
#[cfg(test)]
pub fn connection_refused() -> JobsError {
    JobsError::KubeError(kube::Error::Service(Box::new(std::io::Error::other(
        "connection refused",
    ))))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "jobs_test.rs"]
mod tests;
