//! Command-line configuration and Kubernetes client bootstrap

use crate::jobs::DEFAULT_MAX_PAGES;
use crate::labels::LabelFilter;
use crate::poller::{PollerConfig, DEFAULT_RETRIES};
use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("in-cluster config unavailable: {0}")]
    InCluster(#[from] kube::config::InClusterError),

    #[error("failed to load kubeconfig {path}: {source}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to load kubeconfig from KUBECONFIG: {0}")]
    KubeconfigEnv(#[source] KubeconfigError),

    #[error("kubeconfig is not usable: {0}")]
    InvalidKubeconfig(#[source] KubeconfigError),

    #[error("no kubeconfig path given and home directory is unknown")]
    NoKubeconfigPath,

    #[error("failed to create Kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Wait for labelled Jobs to complete, then serve a health endpoint
#[derive(Debug, Clone, Parser)]
#[command(name = "jobhunter", version)]
pub struct Args {
    /// Path to the kubeconfig file (ignored with --incluster=true).
    /// Unset: $KUBECONFIG (may list several files), then ~/.kube/config
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, default_value_t = 8001)]
    pub port: u16,

    /// Number of poll iterations before giving up
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Namespace to watch; empty watches every namespace
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Use in-cluster service account credentials
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub incluster: bool,

    /// Label pair used to find Jobs, as key:value (repeatable)
    #[arg(long = "labels", value_name = "KEY:VALUE")]
    pub labels: Vec<LabelFilter>,

    /// Seconds to sleep between poll iterations
    #[arg(long, default_value_t = 1)]
    pub interval_secs: u64,

    /// Page size for job listings
    #[arg(long, default_value_t = 500)]
    pub page_size: u32,

    /// Most pages followed for one listing before it counts as failed
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: usize,

    /// Exit non-zero instead of serving when retries run out
    #[arg(long)]
    pub fail_on_timeout: bool,
}

impl Args {
    /// Build the explicit poller configuration
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            namespace: self.namespace.clone(),
            filters: self.labels.clone(),
            retries: self.retries,
            interval: Duration::from_secs(self.interval_secs),
        }
    }

    /// Explicit `--kubeconfig`, or `~/.kube/config`
    pub fn kubeconfig_path(&self) -> Option<PathBuf> {
        self.kubeconfig
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".kube").join("config")))
    }

    /// Load the kubeconfig named by the flag, `$KUBECONFIG`, or the home default
    fn load_kubeconfig(&self) -> Result<Kubeconfig, BootstrapError> {
        if self.kubeconfig.is_none() {
            // Handles the `:`-separated list form of KUBECONFIG
            if let Some(kubeconfig) =
                Kubeconfig::from_env().map_err(BootstrapError::KubeconfigEnv)?
            {
                info!("Using kubeconfig from KUBECONFIG");
                return Ok(kubeconfig);
            }
        }

        let path = self
            .kubeconfig_path()
            .ok_or(BootstrapError::NoKubeconfigPath)?;
        info!(path = %path.display(), "Using kubeconfig file");

        Kubeconfig::read_from(&path).map_err(|source| BootstrapError::Kubeconfig { path, source })
    }

    /// Resolve client configuration from in-cluster credentials or a kubeconfig file
    pub async fn kube_config(&self) -> Result<kube::Config, BootstrapError> {
        if self.incluster {
            info!("Using in-cluster configuration");
            return Ok(kube::Config::incluster()?);
        }

        let kubeconfig = self.load_kubeconfig()?;
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(BootstrapError::InvalidKubeconfig)
    }

    pub async fn kube_client(&self) -> Result<kube::Client, BootstrapError> {
        let config = self.kube_config().await?;
        Ok(kube::Client::try_from(config)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "config_test.rs"]
mod tests;
