//! Per-endpoint clients.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{TransportError, TransportResult};

/// A client bound to a single gateway.
#[async_trait]
pub trait EndpointClient: Send + Sync {
    /// Host used in logs and errors.
    fn host(&self) -> &str;

    /// GET `path` and return the response body.
    async fn get(&self, path: &str) -> TransportResult<Bytes>;
}

/// REST client for one endpoint.
#[derive(Debug, Clone)]
pub struct HttpClient {
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> TransportResult<Self> {
        if endpoint.host.trim().is_empty() {
            return Err(TransportError::InvalidEndpoint {
                host: endpoint.host,
                reason: "empty host".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chainwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidEndpoint {
                host: endpoint.host.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl EndpointClient for HttpClient {
    fn host(&self) -> &str {
        &self.endpoint.host
    }

    async fn get(&self, path: &str) -> TransportResult<Bytes> {
        let url = self.endpoint.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                host: self.endpoint.host.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(%url, %status, "gateway returned non-2xx");
            return Err(TransportError::Status {
                host: self.endpoint.host.clone(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                host: self.endpoint.host.clone(),
                source,
            })
    }
}
