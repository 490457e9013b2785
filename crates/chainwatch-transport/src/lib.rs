//! chainwatch-transport: resilient access to blockchain query gateways.
//!
//! Wraps an ordered list of per-endpoint clients. Every call starts at the
//! first endpoint and moves down the list on failure; there is no parallel
//! fan-out, no backoff, and no preference carried between calls.
//!
//! # Architecture
//!
//! ```text
//! FailoverTransport<C: EndpointClient>
//!   ├── clients: [endpoint 0, endpoint 1, ...]
//!   ├── submit(ctx, op) → first success, or AllRetriesFailed
//!   └── get_json(ctx, path) → submit + serde_json decode
//!
//! HttpClient (reqwest, rustls)
//!   └── get(path) → body bytes, non-2xx is an error
//! ```

pub mod client;
pub mod endpoint;
pub mod error;
pub mod failover;

pub use client::{EndpointClient, HttpClient};
pub use endpoint::{Endpoint, Scheme};
pub use error::{TransportError, TransportResult};
pub use failover::FailoverTransport;
