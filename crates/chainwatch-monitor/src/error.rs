//! Monitor runtime error types.

use chainwatch_metrics::MetricsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// No registered monitor provides this metric.
    #[error("no monitor provides metric: {0}")]
    MonitorNotFound(String),

    #[error("metric {metric} is provided by both {existing} and {incoming}")]
    MetricCollision {
        metric: String,
        existing: String,
        incoming: String,
    },

    #[error("metric store error: {0}")]
    Metrics(#[from] MetricsError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
