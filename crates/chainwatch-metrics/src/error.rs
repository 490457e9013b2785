//! Metric model error types.

use thiserror::Error;

/// Result type alias for metric model operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised when a caller addresses a metric the set does not declare.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("unknown metric vector: {0}")]
    UnknownVector(String),
}
