//! Missed block signatures per watched validator.
//!
//! Each run looks at every height produced since the previous run (capped
//! to the newest `max_heights`), fetches their signer sets concurrently and
//! adds one to a validator's drain counter for every height it did not
//! sign. A height whose fetch fails is skipped for that validator set, not
//! retried. When no height at all could be fetched the run fails and leaves
//! the last checked height alone, so the same heights are tried next run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use chainwatch_metrics::{MetricSet, MetricStore};
use chainwatch_monitor::Monitor;
use chainwatch_poll::fan_out;
use chainwatch_transport::{EndpointClient, FailoverTransport, HttpClient};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::MissedBlocksConfig;
use crate::json;

/// Where block heights and their signers come from.
#[async_trait]
pub trait SignatureSource: Send + Sync {
    async fn latest_height(&self, ctx: &CancellationToken) -> anyhow::Result<u64>;

    /// Addresses that signed the block at `height`.
    async fn signers(
        &self,
        ctx: &CancellationToken,
        height: u64,
    ) -> anyhow::Result<HashSet<String>>;
}

/// Bounds on the per-run fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutLimits {
    /// Block fetches in flight at once.
    pub concurrency: usize,
    /// Heights examined per run; older ones are skipped.
    pub max_heights: u64,
}

impl Default for FanoutLimits {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_heights: 100,
        }
    }
}

/// [`SignatureSource`] over REST block documents.
pub struct JsonSignatureSource<C = HttpClient> {
    config: MissedBlocksConfig,
    transport: Arc<FailoverTransport<C>>,
}

impl<C: EndpointClient> JsonSignatureSource<C> {
    pub fn new(config: MissedBlocksConfig, transport: Arc<FailoverTransport<C>>) -> Self {
        Self { config, transport }
    }
}

#[async_trait]
impl<C: EndpointClient + 'static> SignatureSource for JsonSignatureSource<C> {
    async fn latest_height(&self, ctx: &CancellationToken) -> anyhow::Result<u64> {
        let doc: Value = self
            .transport
            .get_json(ctx, &self.config.latest_height_path)
            .await
            .with_context(|| format!("{}: fetching latest height", self.config.name))?;
        json::u64_at(&doc, &self.config.latest_height_pointer).with_context(|| {
            format!(
                "{}: no height at {}",
                self.config.name, self.config.latest_height_pointer
            )
        })
    }

    async fn signers(
        &self,
        ctx: &CancellationToken,
        height: u64,
    ) -> anyhow::Result<HashSet<String>> {
        let path = json::fill(&self.config.block_path, "height", &height.to_string());
        let doc: Value = self
            .transport
            .get_json(ctx, &path)
            .await
            .with_context(|| format!("{}: fetching block {height}", self.config.name))?;

        let signatures = json::lookup(&doc, &self.config.signers_pointer)
            .and_then(Value::as_array)
            .with_context(|| {
                format!(
                    "{}: no signatures at {} for block {height}",
                    self.config.name, self.config.signers_pointer
                )
            })?;

        Ok(signatures
            .iter()
            .filter_map(|signature| {
                if self.config.signer_field.is_empty() {
                    json::as_text(signature)
                } else {
                    json::text_at(signature, &self.config.signer_field)
                }
            })
            .filter(|address| !address.is_empty())
            .collect())
    }
}

pub struct MissedBlocksMonitor<S> {
    name: String,
    validators: Vec<String>,
    limits: FanoutLimits,
    missed_metric: String,
    height_metric: String,
    store: MetricStore,
    source: Arc<S>,
    /// Highest height already examined.
    last_checked: Mutex<Option<u64>>,
}

impl<S: SignatureSource + 'static> MissedBlocksMonitor<S> {
    pub fn new(config: &MissedBlocksConfig, limits: FanoutLimits, source: S) -> Self {
        let missed_metric = format!("{}_missed_blocks", config.name);
        let height_metric = format!("{}_last_height", config.name);
        let schema = MetricSet::new()
            .with_drain_vector(missed_metric.as_str(), config.label_key.as_str())
            .with_gauge(height_metric.as_str());

        Self {
            name: config.name.clone(),
            validators: config.validators.clone(),
            limits,
            missed_metric,
            height_metric,
            store: MetricStore::new(schema),
            source: Arc::new(source),
            last_checked: Mutex::new(None),
        }
    }

    /// Heights to examine this run, oldest first.
    fn pending_heights(&self, latest: u64) -> std::ops::RangeInclusive<u64> {
        let from = match self.last_checked() {
            None => latest,
            Some(last) if last >= latest => return 1..=0,
            Some(last) => last + 1,
        };

        let floor = latest.saturating_sub(self.limits.max_heights.max(1) - 1);
        if from < floor {
            warn!(
                monitor = %self.name,
                skipped = floor - from,
                "too many new heights; only the newest are checked"
            );
        }
        from.max(floor)..=latest
    }

    fn last_checked(&self) -> Option<u64> {
        *self.last_checked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `latest` as examined. Never moves backwards when a lagging
    /// endpoint reports an older height.
    fn mark_checked(&self, latest: u64) -> u64 {
        let mut guard = self.last_checked.lock().unwrap_or_else(PoisonError::into_inner);
        let checked = guard.map_or(latest, |last| last.max(latest));
        *guard = Some(checked);
        checked
    }
}

#[async_trait]
impl<S: SignatureSource + 'static> Monitor for MissedBlocksMonitor<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn store(&self) -> &MetricStore {
        &self.store
    }

    async fn handler(&self, ctx: &CancellationToken) -> anyhow::Result<()> {
        let latest = self
            .source
            .latest_height(ctx)
            .await
            .with_context(|| format!("{}: latest height", self.name))?;

        let heights = self.pending_heights(latest);
        let source = Arc::clone(&self.source);
        let fetch_ctx = ctx.clone();
        let blocks = fan_out(ctx, heights.clone(), self.limits.concurrency, move |height| {
            let source = Arc::clone(&source);
            let ctx = fetch_ctx.clone();
            async move { source.signers(&ctx, height).await }
        })
        .await;

        if blocks.is_empty() && !heights.is_empty() {
            anyhow::bail!(
                "{}: no block in {}..={} could be fetched",
                self.name,
                heights.start(),
                heights.end()
            );
        }

        let mut staging = self.store.stage();
        {
            let missed = staging.vector_mut(&self.missed_metric)?;
            for validator in &self.validators {
                missed.add(validator.as_str(), 0.0);
            }
            for signers in &blocks {
                for validator in &self.validators {
                    if !signers.contains(validator) {
                        missed.add(validator.as_str(), 1.0);
                    }
                }
            }
        }
        let checked = self.mark_checked(latest);
        staging.set(&self.height_metric, checked as f64)?;
        staging.commit().await;

        debug!(
            monitor = %self.name,
            heights = heights.count(),
            fetched = blocks.len(),
            latest,
            "signatures checked"
        );
        Ok(())
    }
}
