//! Per-label amounts with MAD outlier flags.
//!
//! Typical use is delegation imbalance: one item per validator, amount in
//! base units. Amounts are compared exactly as integers; only the published
//! gauges are converted to `f64`.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chainwatch_metrics::{MetricSet, MetricStore};
use chainwatch_monitor::Monitor;
use chainwatch_poll::{find_outliers, median, parse_amount};
use chainwatch_transport::{EndpointClient, FailoverTransport, HttpClient};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DistributionConfig;
use crate::json;

pub struct DistributionMonitor<C = HttpClient> {
    config: DistributionConfig,
    n_mads: u128,
    metrics: Names,
    store: MetricStore,
    transport: Arc<FailoverTransport<C>>,
}

struct Names {
    amount: String,
    outlier: String,
    outliers: String,
    median: String,
}

impl<C: EndpointClient> DistributionMonitor<C> {
    /// `n_mads` applies unless the config overrides it.
    pub fn new(
        config: DistributionConfig,
        n_mads: u64,
        transport: Arc<FailoverTransport<C>>,
    ) -> Self {
        let metrics = Names {
            amount: format!("{}_amount", config.name),
            outlier: format!("{}_outlier", config.name),
            outliers: format!("{}_outliers", config.name),
            median: format!("{}_median", config.name),
        };
        let schema = MetricSet::new()
            .with_gauge_vector(metrics.amount.as_str(), config.label_key.as_str())
            .with_gauge_vector(metrics.outlier.as_str(), config.label_key.as_str())
            .with_gauge(metrics.outliers.as_str())
            .with_gauge(metrics.median.as_str());

        Self {
            n_mads: u128::from(config.n_mads.unwrap_or(n_mads)),
            config,
            metrics,
            store: MetricStore::new(schema),
            transport,
        }
    }

    /// (label, amount) pairs; malformed items are logged and skipped.
    fn items(&self, doc: &Value) -> anyhow::Result<Vec<(String, u128)>> {
        let items = json::lookup(doc, &self.config.items_pointer)
            .and_then(Value::as_array)
            .with_context(|| {
                format!(
                    "{}: no array at {}",
                    self.config.name, self.config.items_pointer
                )
            })?;

        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let label = json::text_at(item, &self.config.label_pointer);
            let amount = json::text_at(item, &self.config.amount_pointer)
                .as_deref()
                .and_then(parse_amount);
            match (label, amount) {
                (Some(label), Some(amount)) => out.push((label, amount)),
                _ => warn!(monitor = %self.config.name, index, "skipping malformed item"),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl<C: EndpointClient + 'static> Monitor for DistributionMonitor<C> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn store(&self) -> &MetricStore {
        &self.store
    }

    async fn handler(&self, ctx: &CancellationToken) -> anyhow::Result<()> {
        let doc: Value = self
            .transport
            .get_json(ctx, &self.config.path)
            .await
            .with_context(|| format!("{}: fetching {}", self.config.name, self.config.path))?;
        let items = self.items(&doc)?;

        let amounts: Vec<u128> = items.iter().map(|(_, amount)| *amount).collect();
        let flagged = find_outliers(&amounts, self.n_mads);

        let mut staging = self.store.stage();
        {
            let vector = staging.vector_mut(&self.metrics.amount)?;
            for (label, amount) in &items {
                vector.set(label.as_str(), *amount as f64);
            }
        }
        {
            let vector = staging.vector_mut(&self.metrics.outlier)?;
            for (index, (label, _)) in items.iter().enumerate() {
                let is_outlier = flagged.binary_search(&index).is_ok();
                vector.set(label.as_str(), if is_outlier { 1.0 } else { 0.0 });
            }
        }
        staging.set(&self.metrics.outliers, flagged.len() as f64)?;
        staging.set(
            &self.metrics.median,
            median(&amounts).map_or(0.0, |m| m as f64),
        )?;
        staging.commit().await;

        debug!(
            monitor = %self.config.name,
            items = items.len(),
            outliers = flagged.len(),
            "distribution updated"
        );
        Ok(())
    }
}
