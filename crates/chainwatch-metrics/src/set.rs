//! A named collection of cells and vectors.
//!
//! The same type serves as a monitor's declared schema, as the live state
//! inside a [`MetricStore`](crate::MetricStore), and as the staging buffer a
//! handler fills before committing.

use std::collections::HashMap;

use crate::cell::{MetricCell, MetricKind};
use crate::error::{MetricsError, MetricsResult};
use crate::vector::MetricVector;

/// Metric identifier. Unique across every registered monitor, across both
/// the scalar and the vector namespace.
pub type MetricName = String;

#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    values: HashMap<MetricName, MetricCell>,
    vectors: HashMap<MetricName, MetricVector>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gauge(mut self, name: impl Into<MetricName>) -> Self {
        self.declare_value(name, MetricKind::Gauge);
        self
    }

    pub fn with_drain(mut self, name: impl Into<MetricName>) -> Self {
        self.declare_value(name, MetricKind::Drain);
        self
    }

    pub fn with_gauge_vector(
        mut self,
        name: impl Into<MetricName>,
        label_key: impl Into<String>,
    ) -> Self {
        self.declare_vector(name, MetricKind::Gauge, label_key);
        self
    }

    pub fn with_drain_vector(
        mut self,
        name: impl Into<MetricName>,
        label_key: impl Into<String>,
    ) -> Self {
        self.declare_vector(name, MetricKind::Drain, label_key);
        self
    }

    /// Declare a scalar. Re-declaring an existing scalar resets it.
    pub fn declare_value(&mut self, name: impl Into<MetricName>, kind: MetricKind) {
        self.values.insert(name.into(), MetricCell::new(kind));
    }

    /// Declare a vector. Re-declaring an existing vector empties it.
    pub fn declare_vector(
        &mut self,
        name: impl Into<MetricName>,
        kind: MetricKind,
        label_key: impl Into<String>,
    ) {
        self.vectors
            .insert(name.into(), MetricVector::new(kind, label_key));
    }

    /// Declared scalar names, sorted.
    pub fn value_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Declared vector names, sorted.
    pub fn vector_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vectors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn cell(&self, name: &str) -> Option<&MetricCell> {
        self.values.get(name)
    }

    pub fn cell_mut(&mut self, name: &str) -> MetricsResult<&mut MetricCell> {
        self.values
            .get_mut(name)
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))
    }

    pub fn vector(&self, name: &str) -> Option<&MetricVector> {
        self.vectors.get(name)
    }

    pub fn vector_mut(&mut self, name: &str) -> MetricsResult<&mut MetricVector> {
        self.vectors
            .get_mut(name)
            .ok_or_else(|| MetricsError::UnknownVector(name.to_string()))
    }

    pub fn set(&mut self, name: &str, value: f64) -> MetricsResult<()> {
        self.cell_mut(name)?.set(value);
        Ok(())
    }

    pub fn add(&mut self, name: &str, delta: f64) -> MetricsResult<()> {
        self.cell_mut(name)?.add(delta);
        Ok(())
    }

    /// Same declarations, every cell at zero and every vector empty.
    pub(crate) fn zeroed(&self) -> MetricSet {
        MetricSet {
            values: self
                .values
                .iter()
                .map(|(name, cell)| (name.clone(), MetricCell::new(cell.kind())))
                .collect(),
            vectors: self
                .vectors
                .iter()
                .map(|(name, vector)| (name.clone(), vector.emptied()))
                .collect(),
        }
    }

    /// Fold a staged set into this live one. Names the live set does not
    /// declare are ignored.
    pub(crate) fn absorb(&mut self, staged: MetricSet) {
        for (name, cell) in &staged.values {
            if let Some(live) = self.values.get_mut(name) {
                live.absorb(cell);
            }
        }
        for (name, vector) in staged.vectors {
            if let Some(live) = self.vectors.get_mut(&name) {
                live.absorb(vector);
            }
        }
    }
}
