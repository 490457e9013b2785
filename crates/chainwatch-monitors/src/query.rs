//! Gauges read straight out of one REST response.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chainwatch_metrics::{MetricSet, MetricStore};
use chainwatch_monitor::Monitor;
use chainwatch_transport::{EndpointClient, FailoverTransport, HttpClient};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::QueryConfig;
use crate::json;

pub struct QueryMonitor<C = HttpClient> {
    name: String,
    path: String,
    /// (metric name, pointer)
    fields: Vec<(String, String)>,
    store: MetricStore,
    transport: Arc<FailoverTransport<C>>,
}

impl<C: EndpointClient> QueryMonitor<C> {
    pub fn new(config: QueryConfig, transport: Arc<FailoverTransport<C>>) -> Self {
        let fields: Vec<(String, String)> = config
            .gauges
            .into_iter()
            .map(|field| (format!("{}_{}", config.name, field.metric), field.pointer))
            .collect();

        let schema = fields
            .iter()
            .fold(MetricSet::new(), |schema, (metric, _)| schema.with_gauge(metric.as_str()));

        Self {
            name: config.name,
            path: config.path,
            fields,
            store: MetricStore::new(schema),
            transport,
        }
    }
}

#[async_trait]
impl<C: EndpointClient + 'static> Monitor for QueryMonitor<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn store(&self) -> &MetricStore {
        &self.store
    }

    async fn handler(&self, ctx: &CancellationToken) -> anyhow::Result<()> {
        let doc: Value = self
            .transport
            .get_json(ctx, &self.path)
            .await
            .with_context(|| format!("{}: fetching {}", self.name, self.path))?;

        let mut staging = self.store.stage();
        for (metric, pointer) in &self.fields {
            match json::f64_at(&doc, pointer) {
                Some(value) => staging.set(metric, value)?,
                None => warn!(
                    monitor = %self.name,
                    %metric,
                    %pointer,
                    "field missing or not numeric"
                ),
            }
        }
        staging.commit().await;
        Ok(())
    }
}
