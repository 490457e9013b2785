//! Change detection for remote documents (chain parameters, contract
//! configs, whitelists).

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use chainwatch_metrics::{MetricSet, MetricStore};
use chainwatch_monitor::Monitor;
use chainwatch_poll::{fingerprint, Drift, FingerprintTracker};
use chainwatch_transport::{EndpointClient, FailoverTransport, HttpClient};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::FingerprintConfig;
use crate::json;

pub struct FingerprintMonitor<C = HttpClient> {
    config: FingerprintConfig,
    fingerprint_metric: String,
    changes_metric: String,
    store: MetricStore,
    tracker: Mutex<FingerprintTracker>,
    transport: Arc<FailoverTransport<C>>,
}

impl<C: EndpointClient> FingerprintMonitor<C> {
    pub fn new(config: FingerprintConfig, transport: Arc<FailoverTransport<C>>) -> Self {
        let fingerprint_metric = format!("{}_fingerprint", config.name);
        let changes_metric = format!("{}_changes", config.name);
        let schema = MetricSet::new()
            .with_gauge(fingerprint_metric.as_str())
            .with_drain(changes_metric.as_str());

        Self {
            config,
            fingerprint_metric,
            changes_metric,
            store: MetricStore::new(schema),
            tracker: Mutex::new(FingerprintTracker::new()),
            transport,
        }
    }
}

#[async_trait]
impl<C: EndpointClient + 'static> Monitor for FingerprintMonitor<C> {
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

        let watched = match &self.config.pointer {
            Some(pointer) => json::lookup(&doc, pointer)
                .with_context(|| format!("{}: nothing at {pointer}", self.config.name))?,
            None => &doc,
        };
        let current = fingerprint(watched)?;

        let drift = self
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(current);

        let mut staging = self.store.stage();
        staging.set(&self.fingerprint_metric, f64::from(current))?;
        if let Drift::Changed { previous } = drift {
            info!(
                monitor = %self.config.name,
                previous = %format!("{previous:08x}"),
                current = %format!("{current:08x}"),
                "remote document changed"
            );
            staging.add(&self.changes_metric, 1.0)?;
        }
        staging.commit().await;
        Ok(())
    }
}
