//! chainwatchd: the chainwatch daemon.
//!
//! Polls blockchain REST gateways on a fixed schedule and serves the
//! results as Prometheus metrics.
//!
//! # Startup
//!
//! ```text
//! chainwatch.toml
//!   → ChainwatchConfig::validate
//!   → FailoverTransport (one HttpClient per endpoint)
//!   → build_monitors → build_registry (first poll, collisions abort)
//!   → Scheduler::start (one task per monitor)
//!   → axum: GET /metrics, GET /healthz
//! Ctrl-C → cancel root token → graceful shutdown → scheduler join
//! ```

pub mod config;
pub mod server;
pub mod wiring;

pub use config::{parse_duration, ChainwatchConfig, Thresholds};
pub use server::router;
pub use wiring::{build_monitors, build_registry, metric_names};
