//! In-memory gateway for monitor tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chainwatch_transport::{EndpointClient, FailoverTransport, TransportError, TransportResult};
use serde_json::Value;

/// Serves canned JSON per path; unknown paths are 404. Clones share routes.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    routes: Arc<Mutex<HashMap<String, Value>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, path: &str, body: Value) -> &Self {
        self.routes.lock().unwrap().insert(path.to_string(), body);
        self
    }

    pub fn remove(&self, path: &str) {
        self.routes.lock().unwrap().remove(path);
    }

    pub fn transport(&self) -> Arc<FailoverTransport<MockGateway>> {
        Arc::new(FailoverTransport::new(vec![self.clone()]).unwrap())
    }
}

#[async_trait]
impl EndpointClient for MockGateway {
    fn host(&self) -> &str {
        "mock"
    }

    async fn get(&self, path: &str) -> TransportResult<Bytes> {
        let body = self.routes.lock().unwrap().get(path).cloned();
        match body {
            Some(body) => Ok(Bytes::from(serde_json::to_vec(&body).unwrap())),
            None => Err(TransportError::Status {
                host: "mock".to_string(),
                status: 404,
            }),
        }
    }
}
