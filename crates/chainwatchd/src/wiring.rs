//! Builds monitors from configuration and registers them.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use chainwatch_monitor::{Monitor, Registry};
use chainwatch_monitors::{
    DistributionMonitor, FanoutLimits, FingerprintMonitor, JsonPageSource, JsonSignatureSource,
    MissedBlocksMonitor, QueryMonitor, TxHistoryMonitor,
};
use chainwatch_transport::{EndpointClient, FailoverTransport};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ChainwatchConfig;

/// One monitor per configured entry, all sharing `transport`.
pub fn build_monitors<C: EndpointClient + 'static>(
    config: &ChainwatchConfig,
    transport: Arc<FailoverTransport<C>>,
) -> Vec<Arc<dyn Monitor>> {
    let thresholds = &config.thresholds;
    let mut monitors: Vec<Arc<dyn Monitor>> = Vec::new();

    for query in &config.query {
        monitors.push(Arc::new(QueryMonitor::new(query.clone(), transport.clone())));
    }
    for distribution in &config.distribution {
        monitors.push(Arc::new(DistributionMonitor::new(
            distribution.clone(),
            thresholds.n_mads,
            transport.clone(),
        )));
    }
    for history in &config.tx_history {
        let source = JsonPageSource::new(history.clone(), transport.clone());
        monitors.push(Arc::new(TxHistoryMonitor::new(
            history.name.clone(),
            thresholds.backfill_page_threshold,
            source,
        )));
    }
    let limits = FanoutLimits {
        concurrency: thresholds.fanout_concurrency,
        max_heights: thresholds.missed_blocks_max_heights,
    };
    for missed in &config.missed_blocks {
        let source = JsonSignatureSource::new(missed.clone(), transport.clone());
        monitors.push(Arc::new(MissedBlocksMonitor::new(missed, limits, source)));
    }
    for drift in &config.fingerprint {
        monitors.push(Arc::new(FingerprintMonitor::new(drift.clone(), transport.clone())));
    }

    monitors
}

/// Register every monitor, running each one's first poll. A metric name
/// collision aborts.
pub async fn build_registry(
    monitors: Vec<Arc<dyn Monitor>>,
    ctx: &CancellationToken,
) -> anyhow::Result<Registry> {
    let mut registry = Registry::new();
    for monitor in monitors {
        let name = monitor.name().to_string();
        registry
            .register(monitor, ctx)
            .await
            .with_context(|| format!("registering monitor {name}"))?;
    }
    info!(
        monitors = registry.len(),
        metrics = registry.provided_metrics().len(),
        vectors = registry.provided_metric_vectors().len(),
        "registry ready"
    );
    Ok(registry)
}

/// Every metric name the monitors would register, sorted, without polling
/// anything. Fails on the first collision.
pub fn metric_names(monitors: &[Arc<dyn Monitor>]) -> anyhow::Result<Vec<String>> {
    let mut owners: HashMap<String, String> = HashMap::new();
    for monitor in monitors {
        let names = monitor
            .provided_metrics()
            .into_iter()
            .chain(monitor.provided_metric_vectors());
        for metric in names {
            if let Some(existing) = owners.insert(metric.clone(), monitor.name().to_string()) {
                bail!(
                    "metric {metric} is provided by both {existing} and {}",
                    monitor.name()
                );
            }
        }
    }

    let mut names: Vec<String> = owners.into_keys().collect();
    names.sort();
    Ok(names)
}
