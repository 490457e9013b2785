//! chainwatch-metrics: the metric value model shared by every monitor.
//!
//! Monitors never write to externally visible state directly. They build
//! a fresh [`MetricSet`] through [`MetricStore::stage`], fill it in, and
//! publish it in one step with [`Staging::commit`]. Scrapes read through
//! [`MetricStore::read_value`] and [`MetricStore::read_vector`].
//!
//! # Architecture
//!
//! ```text
//! MetricStore
//!   ├── schema: MetricSet (declared names, zeroed)
//!   ├── live:   RwLock<MetricSet>
//!   ├── stage()  → Staging (fresh zeroed copy of the schema)
//!   │     └── commit() → write lock, gauges replaced, drains merged
//!   └── read_value() / read_vector()
//!         ├── gauge: read lock, copy
//!         └── drain: write lock, copy, zero (labels kept)
//!
//! Prometheus exposition
//!   └── Exposition::push_value / push_vector → text/plain
//! ```
//!
//! Cells and vectors come in two kinds, see [`MetricKind`]. A drain cell
//! resets to zero the moment it is read:
//!
//! ```
//! use chainwatch_metrics::MetricCell;
//!
//! let mut missed = MetricCell::drain();
//! missed.add(3.0);
//! missed.add(4.0);
//! assert_eq!(missed.get(), 7.0);
//! assert_eq!(missed.get(), 0.0);
//! ```

pub mod cell;
pub mod error;
pub mod prometheus;
pub mod set;
pub mod store;
pub mod vector;

pub use cell::{MetricCell, MetricKind};
pub use error::{MetricsError, MetricsResult};
pub use prometheus::{is_valid_metric_name, Exposition};
pub use set::{MetricName, MetricSet};
pub use store::{MetricStore, Staging};
pub use vector::MetricVector;
