//! Live metric state with build-then-swap updates.
//!
//! A handler calls [`MetricStore::stage`], fills the returned [`Staging`]
//! buffer from scratch (remote calls happen here, without any lock held),
//! and publishes it with [`Staging::commit`]. Commit is the only write path
//! into live state and holds the write lock only for the in-memory fold.
//!
//! Readers therefore observe either the previous or the new snapshot of a
//! vector, never a mix of the two.

use std::ops::{Deref, DerefMut};

use tokio::sync::RwLock;
use tracing::trace;

use crate::cell::MetricKind;
use crate::error::{MetricsError, MetricsResult};
use crate::set::MetricSet;
use crate::vector::MetricVector;

/// A monitor's published metrics.
#[derive(Debug)]
pub struct MetricStore {
    /// Declared names and kinds, all zero. Never mutated.
    schema: MetricSet,
    live: RwLock<MetricSet>,
}

impl MetricStore {
    pub fn new(schema: MetricSet) -> Self {
        let schema = schema.zeroed();
        Self {
            live: RwLock::new(schema.clone()),
            schema,
        }
    }

    /// The declared metrics.
    pub fn schema(&self) -> &MetricSet {
        &self.schema
    }

    /// Start a new update: a zeroed copy of the schema, detached from live
    /// state until committed.
    pub fn stage(&self) -> Staging<'_> {
        Staging {
            store: self,
            set: self.schema.zeroed(),
        }
    }

    /// Restore live state to the zeroed schema.
    pub async fn reset(&self) {
        *self.live.write().await = self.schema.zeroed();
    }

    /// Read a scalar. Drain cells are reset by the read.
    pub async fn read_value(&self, name: &str) -> MetricsResult<f64> {
        let kind = self
            .schema
            .cell(name)
            .map(|cell| cell.kind())
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))?;

        match kind {
            MetricKind::Gauge => {
                let live = self.live.read().await;
                Ok(live.cell(name).map(|cell| cell.peek()).unwrap_or_default())
            }
            MetricKind::Drain => {
                let mut live = self.live.write().await;
                Ok(live.cell_mut(name)?.get())
            }
        }
    }

    /// Read a vector. Drain vectors are zeroed by the read but keep their
    /// labels, so the next accumulation window starts clean.
    pub async fn read_vector(&self, name: &str) -> MetricsResult<MetricVector> {
        let kind = self
            .schema
            .vector(name)
            .map(|vector| vector.kind())
            .ok_or_else(|| MetricsError::UnknownVector(name.to_string()))?;

        match kind {
            MetricKind::Gauge => {
                let live = self.live.read().await;
                live.vector(name)
                    .cloned()
                    .ok_or_else(|| MetricsError::UnknownVector(name.to_string()))
            }
            MetricKind::Drain => {
                let mut live = self.live.write().await;
                Ok(live.vector_mut(name)?.take_and_reset())
            }
        }
    }

    async fn commit_set(&self, staged: MetricSet) {
        let mut live = self.live.write().await;
        live.absorb(staged);
        trace!("staged metrics committed");
    }
}

/// A detached update for one [`MetricStore`].
///
/// Dereferences to [`MetricSet`] for `set`/`add`/`vector_mut`. Dropping it
/// without calling [`commit`](Self::commit) discards the update and leaves
/// the previously published values in place.
#[derive(Debug)]
pub struct Staging<'a> {
    store: &'a MetricStore,
    set: MetricSet,
}

impl Staging<'_> {
    /// Publish the staged values: gauges replace live values, drains are
    /// added to them.
    pub async fn commit(self) {
        self.store.commit_set(self.set).await;
    }
}

impl Deref for Staging<'_> {
    type Target = MetricSet;

    fn deref(&self) -> &MetricSet {
        &self.set
    }
}

impl DerefMut for Staging<'_> {
    fn deref_mut(&mut self) -> &mut MetricSet {
        &mut self.set
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn schema() -> MetricSet {
        MetricSet::new()
            .with_gauge("height")
            .with_drain("missed_total")
            .with_gauge_vector("stake", "validator")
            .with_drain_vector("missed", "validator")
    }

    #[tokio::test]
    async fn fresh_store_reads_zero() {
        let store = MetricStore::new(schema());
        assert_eq!(store.read_value("height").await.unwrap(), 0.0);
        assert!(store.read_vector("stake").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_names() {
        let store = MetricStore::new(schema());
        assert_eq!(
            store.read_value("stake").await,
            Err(MetricsError::UnknownMetric("stake".to_string()))
        );
        assert_eq!(
            store.read_vector("height").await,
            Err(MetricsError::UnknownVector("height".to_string()))
        );
    }

    #[tokio::test]
    async fn uncommitted_staging_is_invisible() {
        let store = MetricStore::new(schema());

        let mut staging = store.stage();
        staging.set("height", 100.0).unwrap();
        assert_eq!(store.read_value("height").await.unwrap(), 0.0);

        staging.commit().await;
        assert_eq!(store.read_value("height").await.unwrap(), 100.0);

        // A dropped staging buffer leaves the previous values in place.
        let mut staging = store.stage();
        staging.set("height", 200.0).unwrap();
        drop(staging);
        assert_eq!(store.read_value("height").await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn gauge_vector_commit_replaces_labels() {
        let store = MetricStore::new(schema());

        let mut staging = store.stage();
        let stake = staging.vector_mut("stake").unwrap();
        stake.set("alice", 10.0);
        stake.set("bob", 20.0);
        staging.commit().await;

        let mut staging = store.stage();
        staging.vector_mut("stake").unwrap().set("carol", 30.0);
        staging.commit().await;

        let stake = store.read_vector("stake").await.unwrap();
        assert_eq!(stake.labels(), vec!["carol"]);

        // Gauge reads do not reset.
        let stake = store.read_vector("stake").await.unwrap();
        assert_eq!(stake.get("carol"), Some(30.0));
    }

    #[tokio::test]
    async fn drain_value_is_consumed_by_read() {
        let store = MetricStore::new(schema());

        let mut staging = store.stage();
        staging.add("missed_total", 3.0).unwrap();
        staging.add("missed_total", 4.0).unwrap();
        staging.commit().await;

        assert_eq!(store.read_value("missed_total").await.unwrap(), 7.0);
        assert_eq!(store.read_value("missed_total").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn drain_commits_between_scrapes_accumulate() {
        let store = MetricStore::new(schema());

        for _ in 0..3 {
            let mut staging = store.stage();
            staging.vector_mut("missed").unwrap().add("alice", 1.0);
            staging.commit().await;
        }

        let missed = store.read_vector("missed").await.unwrap();
        assert_eq!(missed.get("alice"), Some(3.0));

        // Labels survive the read, values start over.
        let missed = store.read_vector("missed").await.unwrap();
        assert_eq!(missed.labels(), vec!["alice"]);
        assert_eq!(missed.get("alice"), Some(0.0));
    }

    #[tokio::test]
    async fn reset_restores_zeroed_schema() {
        let store = MetricStore::new(schema());
        let mut staging = store.stage();
        staging.set("height", 5.0).unwrap();
        staging.vector_mut("stake").unwrap().set("alice", 1.0);
        staging.commit().await;

        store.reset().await;
        assert_eq!(store.read_value("height").await.unwrap(), 0.0);
        assert!(store.read_vector("stake").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reads_never_see_mixed_snapshots() {
        const LABELS: usize = 50;
        const GENERATIONS: usize = 300;

        let store = Arc::new(MetricStore::new(schema()));

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for generation in 1..=GENERATIONS {
                    let mut staging = store.stage();
                    let stake = staging.vector_mut("stake").unwrap();
                    for label in 0..LABELS {
                        stake.set(format!("validator-{label}"), generation as f64);
                    }
                    staging.commit().await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut last_seen = 0.0;
                loop {
                    let stake = store.read_vector("stake").await.unwrap();
                    if !stake.is_empty() {
                        assert_eq!(stake.len(), LABELS);
                        let first = stake.iter().next().map(|(_, v)| v).unwrap();
                        assert!(
                            stake.iter().all(|(_, v)| v == first),
                            "mixed snapshot observed"
                        );
                        assert!(first >= last_seen, "snapshot went backwards");
                        last_seen = first;
                        if first == GENERATIONS as f64 {
                            break;
                        }
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_drain_reads_neither_drop_nor_double_count() {
        const WINDOWS: usize = 500;

        let store = Arc::new(MetricStore::new(schema()));

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..WINDOWS {
                    let mut staging = store.stage();
                    staging.vector_mut("missed").unwrap().add("alice", 1.0);
                    staging.commit().await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut total = 0.0;
                for _ in 0..WINDOWS {
                    let missed = store.read_vector("missed").await.unwrap();
                    total += missed.get("alice").unwrap_or_default();
                    tokio::task::yield_now().await;
                }
                total
            })
        };

        writer.await.unwrap();
        let mut total = reader.await.unwrap();
        total += store
            .read_vector("missed")
            .await
            .unwrap()
            .get("alice")
            .unwrap_or_default();

        assert_eq!(total, WINDOWS as f64);
    }
}
