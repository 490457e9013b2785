//! Sequential failover across an ordered endpoint list.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::{EndpointClient, HttpClient};
use crate::endpoint::Endpoint;
use crate::error::{TransportError, TransportResult};

/// Tries each endpoint in order until one succeeds.
///
/// The endpoint list is fixed at construction. Every call restarts from
/// endpoint 0, so a healthy primary always takes the traffic.
#[derive(Debug)]
pub struct FailoverTransport<C = HttpClient> {
    clients: Vec<C>,
    /// Failed attempts across all calls, including ones that later
    /// succeeded on another endpoint.
    failed_attempts: AtomicU64,
}

impl FailoverTransport<HttpClient> {
    /// Build one [`HttpClient`] per endpoint, preserving order.
    pub fn from_endpoints(endpoints: &[Endpoint], timeout: Duration) -> TransportResult<Self> {
        let clients = endpoints
            .iter()
            .cloned()
            .map(|endpoint| HttpClient::new(endpoint, timeout))
            .collect::<TransportResult<Vec<_>>>()?;
        Self::new(clients)
    }
}

impl<C: EndpointClient> FailoverTransport<C> {
    pub fn new(clients: Vec<C>) -> TransportResult<Self> {
        if clients.is_empty() {
            return Err(TransportError::NoEndpoints);
        }
        Ok(Self {
            clients,
            failed_attempts: AtomicU64::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn hosts(&self) -> Vec<&str> {
        self.clients.iter().map(|c| c.host()).collect()
    }

    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    /// Run `op` against each endpoint in order and return the first success.
    ///
    /// Each failure is logged with the endpoint index and host. When every
    /// endpoint fails the last error is returned wrapped in
    /// [`TransportError::AllRetriesFailed`]. Cancelling `ctx` aborts the
    /// in-flight attempt and returns [`TransportError::Cancelled`].
    pub async fn submit<'a, T, F, Fut>(
        &'a self,
        ctx: &CancellationToken,
        mut op: F,
    ) -> TransportResult<T>
    where
        F: FnMut(&'a C) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let mut last_error = None;

        for (index, client) in self.clients.iter().enumerate() {
            let attempt = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(TransportError::Cancelled),
                result = op(client) => result,
            };

            match attempt {
                Ok(value) => {
                    if index > 0 {
                        debug!(
                            endpoint = index,
                            host = client.host(),
                            "request served by fallback endpoint"
                        );
                    }
                    return Ok(value);
                }
                Err(e) => {
                    self.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    error!(
                        endpoint = index,
                        host = client.host(),
                        error = %e,
                        "endpoint request failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last) => Err(TransportError::AllRetriesFailed {
                attempts: self.clients.len(),
                last: Box::new(last),
            }),
            None => Err(TransportError::NoEndpoints),
        }
    }

    /// GET `path` with failover.
    pub async fn get(&self, ctx: &CancellationToken, path: &str) -> TransportResult<Bytes> {
        self.submit(ctx, |client| client.get(path)).await
    }

    /// GET `path` and decode the body as JSON. A body that does not decode
    /// counts as a failure of that endpoint.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        path: &str,
    ) -> TransportResult<T> {
        self.submit(ctx, |client| async move {
            let body = client.get(path).await?;
            serde_json::from_slice(&body).map_err(|source| TransportError::Decode {
                host: client.host().to_string(),
                source,
            })
        })
        .await
    }
}
