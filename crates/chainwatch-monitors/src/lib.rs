//! chainwatch-monitors: reusable monitors for REST blockchain gateways.
//!
//! None of these know a chain's schema. Each is configured with a request
//! path and RFC 6901 JSON pointers into the response, so one binary can
//! watch any gateway that speaks JSON.
//!
//! # Monitors
//!
//! ```text
//! QueryMonitor         GET path → gauges at pointers
//! DistributionMonitor  GET path → per-label amounts + MAD outliers
//! TxHistoryMonitor     paged listing → backfill → drain counters
//! MissedBlocksMonitor  new heights → fan-out → drain vector per signer
//! FingerprintMonitor   GET path → digest gauge + change counter
//! ```
//!
//! All requests go through a shared
//! [`FailoverTransport`](chainwatch_transport::FailoverTransport).

pub mod config;
pub mod distribution;
pub mod drift;
pub mod json;
pub mod missed_blocks;
pub mod query;
pub mod tx_history;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    DistributionConfig, FingerprintConfig, GaugeField, MissedBlocksConfig, QueryConfig,
    TxHistoryConfig,
};
pub use distribution::DistributionMonitor;
pub use drift::FingerprintMonitor;
pub use missed_blocks::{FanoutLimits, JsonSignatureSource, MissedBlocksMonitor, SignatureSource};
pub use query::QueryMonitor;
pub use tx_history::{JsonPageSource, TxHistoryMonitor, TxRecord};
