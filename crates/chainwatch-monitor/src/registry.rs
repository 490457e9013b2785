//! Registry: owns every monitor and routes metric reads to them.
//!
//! Built once at startup through `&mut self` registration, then shared
//! read-only behind an `Arc`. Metric names are unique across all monitors
//! and across the scalar and vector namespaces.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chainwatch_metrics::{Exposition, MetricKind, MetricVector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{MonitorError, MonitorResult};
use crate::monitor::Monitor;

#[derive(Default)]
pub struct Registry {
    /// Scalar metric name → owning monitor.
    values: BTreeMap<String, Arc<dyn Monitor>>,
    /// Vector metric name → owning monitor.
    vectors: BTreeMap<String, Arc<dyn Monitor>>,
    /// Registration order, used for scheduling.
    monitors: Vec<Arc<dyn Monitor>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let monitors: Vec<&str> = self.monitors.iter().map(|m| m.name()).collect();
        f.debug_struct("Registry")
            .field("monitors", &monitors)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .field("vectors", &self.vectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor and run its first poll.
    ///
    /// Fails without side effects if any declared name is already taken.
    /// On success the monitor's metrics are reset and its handler runs once
    /// before this returns; a failing first poll is logged only.
    pub async fn register(
        &mut self,
        monitor: Arc<dyn Monitor>,
        ctx: &CancellationToken,
    ) -> MonitorResult<()> {
        let incoming = monitor.name().to_string();
        let values = monitor.provided_metrics();
        let vectors = monitor.provided_metric_vectors();

        let mut seen = HashSet::new();
        for metric in values.iter().chain(vectors.iter()) {
            if let Some(existing) = self.owner(metric) {
                return Err(MonitorError::MetricCollision {
                    metric: metric.clone(),
                    existing: existing.name().to_string(),
                    incoming,
                });
            }
            if !seen.insert(metric.as_str()) {
                return Err(MonitorError::MetricCollision {
                    metric: metric.clone(),
                    existing: incoming.clone(),
                    incoming,
                });
            }
        }

        for metric in values {
            self.values.insert(metric, Arc::clone(&monitor));
        }
        for metric in vectors {
            self.vectors.insert(metric, Arc::clone(&monitor));
        }
        self.monitors.push(Arc::clone(&monitor));

        monitor.init_metrics().await;
        match monitor.handler(ctx).await {
            Ok(()) => debug!(monitor = %incoming, "initial poll complete"),
            Err(e) => warn!(monitor = %incoming, error = %format!("{e:#}"), "initial poll failed"),
        }

        info!(monitor = %incoming, "monitor registered");
        Ok(())
    }

    /// Current value of a scalar metric. Reading a drain metric resets it.
    pub async fn get(&self, name: &str) -> MonitorResult<f64> {
        let monitor = self
            .values
            .get(name)
            .ok_or_else(|| MonitorError::MonitorNotFound(name.to_string()))?;
        monitor.get_metric(name).await
    }

    /// Current contents of a vector metric. Reading a drain vector zeroes
    /// its values but keeps its labels.
    pub async fn get_vector(&self, name: &str) -> MonitorResult<MetricVector> {
        let monitor = self
            .vectors
            .get(name)
            .ok_or_else(|| MonitorError::MonitorNotFound(name.to_string()))?;
        monitor.get_metric_vector(name).await
    }

    /// Every registered scalar metric name, sorted.
    pub fn provided_metrics(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Every registered vector metric name, sorted.
    pub fn provided_metric_vectors(&self) -> Vec<String> {
        self.vectors.keys().cloned().collect()
    }

    pub fn monitors(&self) -> &[Arc<dyn Monitor>] {
        &self.monitors
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Read every metric once and render the Prometheus text format.
    ///
    /// This is a scrape: drain metrics are consumed.
    pub async fn render_prometheus(&self) -> String {
        let mut out = Exposition::new();

        for (name, monitor) in &self.values {
            let kind = monitor
                .store()
                .schema()
                .cell(name)
                .map(|cell| cell.kind())
                .unwrap_or(MetricKind::Gauge);
            match monitor.get_metric(name).await {
                Ok(value) => out.push_value(name, kind, value),
                Err(e) => warn!(metric = %name, error = %e, "skipping metric"),
            }
        }

        for (name, monitor) in &self.vectors {
            match monitor.get_metric_vector(name).await {
                Ok(vector) => out.push_vector(name, &vector),
                Err(e) => warn!(metric = %name, error = %e, "skipping metric vector"),
            }
        }

        out.finish()
    }

    fn owner(&self, metric: &str) -> Option<&Arc<dyn Monitor>> {
        self.values.get(metric).or_else(|| self.vectors.get(metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chainwatch_metrics::{MetricSet, MetricStore};

    struct Counting {
        name: String,
        store: MetricStore,
        runs: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(name: &str, schema: MetricSet) -> Self {
            Self {
                name: name.to_string(),
                store: MetricStore::new(schema),
                runs: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Monitor for Counting {
        fn name(&self) -> &str {
            &self.name
        }

        fn store(&self) -> &MetricStore {
            &self.store
        }

        async fn handler(&self, _ctx: &CancellationToken) -> anyhow::Result<()> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                anyhow::bail!("upstream unavailable");
            }
            let mut staging = self.store.stage();
            for name in self.store.schema().value_names() {
                staging.add(name, run as f64)?;
            }
            for name in self.store.schema().vector_names() {
                staging.vector_mut(name)?.add("val1", 1.0);
            }
            staging.commit().await;
            Ok(())
        }
    }

    fn schema_ab() -> MetricSet {
        MetricSet::new().with_gauge("a_height").with_drain_vector("a_missed", "validator")
    }

    #[tokio::test]
    async fn register_runs_first_poll() {
        let monitor = Arc::new(Counting::new("a", schema_ab()));
        let mut registry = Registry::new();
        registry
            .register(monitor.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(monitor.runs.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get("a_height").await.unwrap(), 1.0);
        assert_eq!(registry.provided_metrics(), vec!["a_height"]);
        assert_eq!(registry.provided_metric_vectors(), vec!["a_missed"]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn collision_across_monitors_is_rejected() {
        let ctx = CancellationToken::new();
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Counting::new("first", schema_ab())), &ctx)
            .await
            .unwrap();

        let second = Arc::new(Counting::new(
            "second",
            MetricSet::new().with_gauge("b_ok").with_gauge("a_height"),
        ));
        let err = registry.register(second.clone(), &ctx).await.unwrap_err();
        match err {
            MonitorError::MetricCollision { metric, existing, incoming } => {
                assert_eq!(metric, "a_height");
                assert_eq!(existing, "first");
                assert_eq!(incoming, "second");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing from the rejected monitor leaked in, and it never ran.
        assert_eq!(second.runs.load(Ordering::SeqCst), 0);
        assert_eq!(registry.provided_metrics(), vec!["a_height"]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn collision_across_namespaces_is_rejected() {
        let ctx = CancellationToken::new();
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Counting::new("first", schema_ab())), &ctx)
            .await
            .unwrap();

        let second = Counting::new("second", MetricSet::new().with_gauge("a_missed"));
        let err = registry.register(Arc::new(second), &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::MetricCollision { ref metric, .. } if metric == "a_missed"
        ));
    }

    #[tokio::test]
    async fn collision_within_one_monitor_is_rejected() {
        let schema = MetricSet::new().with_gauge("dup").with_gauge_vector("dup", "validator");
        let err = Registry::new()
            .register(Arc::new(Counting::new("solo", schema)), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MonitorError::MetricCollision { ref existing, ref incoming, .. }
                if existing == "solo" && incoming == "solo"
        ));
    }

    #[tokio::test]
    async fn unknown_metric_is_not_found() {
        let registry = Registry::new();
        assert!(matches!(
            registry.get("nope").await,
            Err(MonitorError::MonitorNotFound(name)) if name == "nope"
        ));
        assert!(matches!(
            registry.get_vector("nope").await,
            Err(MonitorError::MonitorNotFound(_))
        ));
    }

    #[tokio::test]
    async fn scalar_name_is_not_a_vector() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Counting::new("a", schema_ab())), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(
            registry.get_vector("a_height").await,
            Err(MonitorError::MonitorNotFound(_))
        ));
    }

    #[tokio::test]
    async fn failing_first_poll_still_registers() {
        let mut monitor = Counting::new("flaky", MetricSet::new().with_gauge("flaky_up"));
        monitor.fail = true;
        let mut registry = Registry::new();
        registry
            .register(Arc::new(monitor), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(registry.get("flaky_up").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn drain_vector_resets_on_read() {
        let ctx = CancellationToken::new();
        let monitor = Arc::new(Counting::new("a", schema_ab()));
        let mut registry = Registry::new();
        registry.register(monitor.clone(), &ctx).await.unwrap();

        // Two more polls between scrapes are both counted.
        monitor.handler(&ctx).await.unwrap();
        monitor.handler(&ctx).await.unwrap();

        let first = registry.get_vector("a_missed").await.unwrap();
        assert_eq!(first.get("val1"), Some(3.0));

        let second = registry.get_vector("a_missed").await.unwrap();
        assert_eq!(second.get("val1"), Some(0.0));
        assert_eq!(second.labels(), vec!["val1"]);
    }

    #[tokio::test]
    async fn render_includes_every_metric() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Counting::new("a", schema_ab())), &CancellationToken::new())
            .await
            .unwrap();

        let text = registry.render_prometheus().await;
        assert!(text.contains("# TYPE a_height gauge"));
        assert!(text.contains("a_height 1"));
        assert!(text.contains("a_missed{validator=\"val1\"} 1"));

        // The scrape consumed the drain window.
        let text = registry.render_prometheus().await;
        assert!(text.contains("a_missed{validator=\"val1\"} 0"));
    }

    #[tokio::test]
    async fn debug_lists_monitors_and_metrics() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Counting::new("a", schema_ab())), &CancellationToken::new())
            .await
            .unwrap();

        let debug = format!("{registry:?}");
        assert!(debug.contains("monitors: [\"a\"]"));
        assert!(debug.contains("a_height"));
        assert!(debug.contains("a_missed"));
    }
}
