//! Scalar metric cells.

use std::fmt;

/// How a cell or vector behaves when read and when a staged value is
/// committed over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Absolute value (balances, rates, in-flight counts). Reads are
    /// idempotent; a commit overwrites the live value.
    Gauge,
    /// Delta accumulated between scrapes (e.g. blocks missed since the last
    /// scrape). A read returns the accumulated value and resets it to zero;
    /// a commit adds the staged value to the live one.
    Drain,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Drain => "drain",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single mutable numeric metric.
///
/// Cells carry no synchronization of their own. They are only mutated
/// through a [`Staging`](crate::Staging) buffer owned by one handler, and
/// only read under the [`MetricStore`](crate::MetricStore) lock.
///
/// For a [`MetricKind::Drain`] cell, [`get`](Self::get) is *not* idempotent:
/// the first call returns the accumulated value, the second returns zero
/// until the next `add` or `set`. Use [`peek`](Self::peek) to look without
/// draining.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricCell {
    kind: MetricKind,
    value: f64,
}

impl MetricCell {
    pub const fn new(kind: MetricKind) -> Self {
        Self { kind, value: 0.0 }
    }

    pub const fn gauge() -> Self {
        Self::new(MetricKind::Gauge)
    }

    pub const fn drain() -> Self {
        Self::new(MetricKind::Drain)
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Read the cell. Drain cells reset to zero as part of the read.
    pub fn get(&mut self) -> f64 {
        match self.kind {
            MetricKind::Gauge => self.value,
            MetricKind::Drain => std::mem::take(&mut self.value),
        }
    }

    /// Read the cell without draining it.
    pub fn peek(&self) -> f64 {
        self.value
    }

    pub fn set(&mut self, value: f64) {
        self.value = value;
    }

    pub fn add(&mut self, delta: f64) {
        self.value += delta;
    }

    /// Fold a staged cell into this live one.
    pub(crate) fn absorb(&mut self, staged: &MetricCell) {
        match self.kind {
            MetricKind::Gauge => self.value = staged.value,
            MetricKind::Drain => self.value += staged.value,
        }
    }
}
