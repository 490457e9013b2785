//! chainwatch-monitor: the runtime that drives monitors.
//!
//! A [`Monitor`] owns a [`MetricStore`](chainwatch_metrics::MetricStore)
//! and knows how to refresh it from a remote source. The [`Registry`]
//! guarantees metric names are unique across all monitors and routes
//! reads to the owner. The [`Scheduler`] runs each monitor's handler on a
//! fixed interval until the root cancellation token fires.
//!
//! # Architecture
//!
//! ```text
//! Registry (built once, then shared behind Arc)
//!   ├── values:  metric name → monitor
//!   ├── vectors: metric name → monitor
//!   └── register(monitor, ctx)
//!         ├── collision check across both namespaces
//!         ├── init_metrics()
//!         └── handler(ctx) once, errors logged
//!
//! Scheduler
//!   └── RepeatingTask per monitor
//!         ├── interval tick (missed ticks skipped)
//!         ├── handler(ctx) awaited inline, never overlapping itself
//!         └── exits when ctx is cancelled
//! ```

pub mod error;
pub mod monitor;
pub mod registry;
pub mod scheduler;

pub use error::{MonitorError, MonitorResult};
pub use monitor::Monitor;
pub use registry::Registry;
pub use scheduler::{RepeatingTask, Scheduler};
