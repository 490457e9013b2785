//! Transport error types.

use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("invalid endpoint {host}: {reason}")]
    InvalidEndpoint { host: String, reason: String },

    #[error("request to {host} failed: {source}")]
    Request {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{host} returned HTTP {status}")]
    Status { host: String, status: u16 },

    #[error("failed to decode response from {host}: {source}")]
    Decode {
        host: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("all retries failed ({attempts} endpoints): {last}")]
    AllRetriesFailed {
        attempts: usize,
        last: Box<TransportError>,
    },
}
