//! chainwatch-poll: algorithms shared by many monitors.
//!
//! - [`backfill`]: incremental, watermark-bounded pagination over
//!   newest-first listings (transaction history).
//! - [`outlier`]: median absolute deviation over exact integer amounts
//!   (delegation imbalance).
//! - [`fingerprint`]: 32-bit digest of a serialized value for drift
//!   detection (parameter and config changes).
//! - [`fanout`]: bounded concurrent sub-fetches with best-effort results.

pub mod backfill;
pub mod fanout;
pub mod fingerprint;
pub mod outlier;

pub use backfill::{
    lenient_amount, Backfill, BackfillReport, Page, PageSource, Sequenced, StopReason,
    DEFAULT_PAGE_THRESHOLD, NEVER_RUN,
};
pub use fanout::fan_out;
pub use fingerprint::{fingerprint, Drift, FingerprintTracker};
pub use outlier::{
    find_outliers, median, median_absolute_deviation, parse_amount, Dispersion, DEFAULT_N_MADS,
};
