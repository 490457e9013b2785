//! chainwatch.toml configuration.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use chainwatch_metrics::is_valid_metric_name;
use chainwatch_monitors::{
    DistributionConfig, FingerprintConfig, MissedBlocksConfig, QueryConfig, TxHistoryConfig,
};
use chainwatch_transport::Endpoint;
use serde::{Deserialize, Serialize};

fn default_listen() -> String {
    "0.0.0.0:9100".to_string()
}

fn default_poll_interval() -> String {
    "30s".to_string()
}

fn default_request_timeout() -> String {
    "10s".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainwatchConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    /// Gateways in failover order.
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub query: Vec<QueryConfig>,
    #[serde(default)]
    pub distribution: Vec<DistributionConfig>,
    #[serde(default)]
    pub tx_history: Vec<TxHistoryConfig>,
    #[serde(default)]
    pub missed_blocks: Vec<MissedBlocksConfig>,
    #[serde(default)]
    pub fingerprint: Vec<FingerprintConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Outlier sensitivity for distribution monitors.
    pub n_mads: u64,
    /// Pages read per tx history run before giving up on the watermark.
    pub backfill_page_threshold: usize,
    /// Concurrent block fetches per missed-blocks run.
    pub fanout_concurrency: usize,
    pub missed_blocks_max_heights: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            n_mads: 3,
            backfill_page_threshold: 10,
            fanout_concurrency: 8,
            missed_blocks_max_heights: 100,
        }
    }
}

impl ChainwatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        content
            .parse()
            .with_context(|| format!("parsing {}", path.display()))
    }

    pub fn poll_interval(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.poll_interval)
            .with_context(|| format!("invalid poll_interval: {:?}", self.poll_interval))
    }

    pub fn request_timeout(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.request_timeout)
            .with_context(|| format!("invalid request_timeout: {:?}", self.request_timeout))
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("invalid listen address: {:?}", self.listen))
    }

    /// Every configured monitor name, in registration order.
    pub fn monitor_names(&self) -> Vec<&str> {
        self.query
            .iter()
            .map(|m| m.name.as_str())
            .chain(self.distribution.iter().map(|m| m.name.as_str()))
            .chain(self.tx_history.iter().map(|m| m.name.as_str()))
            .chain(self.missed_blocks.iter().map(|m| m.name.as_str()))
            .chain(self.fingerprint.iter().map(|m| m.name.as_str()))
            .collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.endpoints.is_empty() {
            bail!("at least one endpoint is required");
        }
        if self.poll_interval()?.is_zero() {
            bail!("poll_interval must be greater than zero");
        }
        if self.request_timeout()?.is_zero() {
            bail!("request_timeout must be greater than zero");
        }
        self.listen_addr()?;

        if self.thresholds.backfill_page_threshold == 0 {
            bail!("thresholds.backfill_page_threshold must be greater than zero");
        }
        if self.thresholds.fanout_concurrency == 0 {
            bail!("thresholds.fanout_concurrency must be greater than zero");
        }
        if self.thresholds.missed_blocks_max_heights == 0 {
            bail!("thresholds.missed_blocks_max_heights must be greater than zero");
        }

        let mut seen = HashSet::new();
        for name in self.monitor_names() {
            if !is_valid_metric_name(name) {
                bail!("monitor name {name:?} is not a valid metric prefix");
            }
            if !seen.insert(name) {
                bail!("duplicate monitor name: {name}");
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for ChainwatchConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Parse a duration string like "30s", "500ms" or "2m". A bare number is
/// seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
