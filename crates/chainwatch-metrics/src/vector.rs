//! Label-indexed metric vectors (one row per validator, account, ...).

use std::collections::HashMap;

use crate::cell::MetricKind;

/// A mapping from label value to metric value.
///
/// The `label_key` is the Prometheus label name the rows are exposed under
/// (`validator`, `account`, ...). Row order is irrelevant.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricVector {
    kind: MetricKind,
    label_key: String,
    values: HashMap<String, f64>,
}

impl MetricVector {
    pub fn new(kind: MetricKind, label_key: impl Into<String>) -> Self {
        Self {
            kind,
            label_key: label_key.into(),
            values: HashMap::new(),
        }
    }

    pub fn gauge(label_key: impl Into<String>) -> Self {
        Self::new(MetricKind::Gauge, label_key)
    }

    pub fn drain(label_key: impl Into<String>) -> Self {
        Self::new(MetricKind::Drain, label_key)
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn label_key(&self) -> &str {
        &self.label_key
    }

    pub fn set(&mut self, label: impl Into<String>, value: f64) {
        self.values.insert(label.into(), value);
    }

    /// Add to a row, creating it at zero if absent.
    pub fn add(&mut self, label: impl Into<String>, delta: f64) {
        *self.values.entry(label.into()).or_insert(0.0) += delta;
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.values.get(label).copied()
    }

    /// Known labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.values.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(label, value)| (label.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy the vector out and zero every row, keeping the label set.
    pub(crate) fn take_and_reset(&mut self) -> MetricVector {
        let snapshot = self.clone();
        for value in self.values.values_mut() {
            *value = 0.0;
        }
        snapshot
    }

    /// Same kind and label key, no rows.
    pub(crate) fn emptied(&self) -> MetricVector {
        Self::new(self.kind, self.label_key.clone())
    }

    /// Fold a staged vector into this live one. Gauge vectors are replaced
    /// wholesale so vanished labels disappear; drain vectors are summed per
    /// label and keep labels the staged vector did not mention.
    pub(crate) fn absorb(&mut self, staged: MetricVector) {
        match self.kind {
            MetricKind::Gauge => self.values = staged.values,
            MetricKind::Drain => {
                for (label, delta) in staged.values {
                    *self.values.entry(label).or_insert(0.0) += delta;
                }
            }
        }
    }
}
