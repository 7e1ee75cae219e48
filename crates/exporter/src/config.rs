//! Exporter configuration

use anyhow::{bail, Context, Result};
use exporter_lib::collector::CollectorConfig;
use exporter_lib::stats::CmdClientConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Read if present; environment variables override it
const DEFAULT_CONFIG_FILE: &str = "/etc/vmi-exporter/config.toml";

/// Exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Port serving /metrics and the health probes
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory shared with the VMI launchers, holding their command sockets
    #[serde(default = "default_virt_share_dir")]
    pub virt_share_dir: PathBuf,

    /// Maximum number of VMI sockets scraped at once
    #[serde(default = "default_max_concurrent_scrapes")]
    pub max_concurrent_scrapes: usize,

    /// Deadline for collecting from all VMIs in one scrape
    #[serde(default = "default_collection_timeout")]
    pub collection_timeout_secs: u64,

    /// Added to the collection timeout to get the oldest accepted result
    #[serde(default = "default_stale_margin")]
    pub stale_margin_secs: u64,

    /// Concurrent /metrics requests served before rejecting with 503
    #[serde(default = "default_max_metric_requests")]
    pub max_metric_requests: usize,

    /// Connect and request timeout for a single socket
    #[serde(default = "default_stats_request_timeout")]
    pub stats_request_timeout_secs: u64,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_virt_share_dir() -> PathBuf {
    PathBuf::from("/var/run/kubevirt")
}

fn default_max_concurrent_scrapes() -> usize {
    3
}

fn default_collection_timeout() -> u64 {
    10
}

fn default_stale_margin() -> u64 {
    2
}

fn default_max_metric_requests() -> usize {
    3
}

fn default_stats_request_timeout() -> u64 {
    10
}

impl ExporterConfig {
    /// Load configuration from the default file and `EXPORTER_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from `file` (if it exists) and `EXPORTER_*` variables
    pub fn load_from(file: &Path) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(file).required(false))
            .add_source(config::Environment::with_prefix("EXPORTER").try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_scrapes == 0 {
            bail!("max_concurrent_scrapes must be at least 1");
        }
        if self.collection_timeout_secs == 0 {
            bail!("collection_timeout_secs must be at least 1");
        }
        if self.max_metric_requests == 0 {
            bail!("max_metric_requests must be at least 1");
        }
        if self.stats_request_timeout_secs == 0 {
            bail!("stats_request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig {
            max_in_flight: self.max_concurrent_scrapes,
            timeout: Duration::from_secs(self.collection_timeout_secs),
            stale_margin: Duration::from_secs(self.stale_margin_secs),
        }
    }

    pub fn cmd_client(&self) -> CmdClientConfig {
        let timeout = Duration::from_secs(self.stats_request_timeout_secs);
        CmdClientConfig {
            connect_timeout: timeout,
            request_timeout: timeout,
        }
    }
}
