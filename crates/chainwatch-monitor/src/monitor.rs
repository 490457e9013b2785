//! The `Monitor` capability trait.
//!
//! A monitor declares its metrics up front (the schema of its
//! [`MetricStore`]) and refreshes them in [`Monitor::handler`] through the
//! stage/commit protocol. Everything except `name`, `store` and `handler`
//! has a default that works off the store.

use async_trait::async_trait;
use chainwatch_metrics::{MetricStore, MetricVector};
use tokio_util::sync::CancellationToken;

use crate::error::MonitorResult;

#[async_trait]
pub trait Monitor: Send + Sync {
    /// Stable identifier, used in logs and collision errors.
    fn name(&self) -> &str;

    fn store(&self) -> &MetricStore;

    /// Reset live state to the zeroed schema. Called once at registration.
    async fn init_metrics(&self) {
        self.store().reset().await;
    }

    /// Poll the data source and commit a fresh snapshot.
    ///
    /// On error nothing must have been committed for this cycle; the
    /// previous values stay visible.
    async fn handler(&self, ctx: &CancellationToken) -> anyhow::Result<()>;

    fn provided_metrics(&self) -> Vec<String> {
        self.store()
            .schema()
            .value_names()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    fn provided_metric_vectors(&self) -> Vec<String> {
        self.store()
            .schema()
            .vector_names()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    async fn get_metric(&self, name: &str) -> MonitorResult<f64> {
        Ok(self.store().read_value(name).await?)
    }

    async fn get_metric_vector(&self, name: &str) -> MonitorResult<MetricVector> {
        Ok(self.store().read_vector(name).await?)
    }
}
