//! Test doubles for the remote API
//!
//! [`MockTransport`] stands in for the HTTP layer: it records every request
//! and answers by `area.function`, the last path segment of the request URL.
//! Enabled for this crate's own tests and for dependents through the
//! `test-utils` feature.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::transport::{HttpMethod, HttpTransport, TransportError, TransportResponse};

/// Canned reply for a mocked remote function
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Reply with a JSON body and status 200
    Json(Value),
    /// Reply with a raw body and status
    Raw { status: u16, body: String },
    /// Fail at the transport level
    Fail(String),
}

/// A request observed by [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// GET or POST
    pub method: HttpMethod,
    /// Full request URL
    pub url: String,
    /// Query or body parameters, in send order
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    /// `area.function` addressed by this request
    pub fn function(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }

    /// Value of a parameter, if sent
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Recording transport with per-function canned replies
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// Create an empty mock; unrouted functions fail at the transport level
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a JSON reply for `area.function`
    pub fn reply_json(&self, function: &str, body: Value) {
        self.routes
            .lock()
            .insert(function.to_string(), MockReply::Json(body));
    }

    /// Register an arbitrary reply for `area.function`
    pub fn reply(&self, function: &str, reply: MockReply) {
        self.routes.lock().insert(function.to_string(), reply);
    }

    /// All requests seen so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Number of requests sent to `area.function`
    pub fn calls_to(&self, function: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.function() == function)
            .count()
    }

    fn respond(
        &self,
        method: HttpMethod,
        url: &str,
        params: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let request = RecordedRequest {
            method,
            url: url.to_string(),
            params: params.to_vec(),
        };
        let reply = self.routes.lock().get(request.function()).cloned();
        self.requests.lock().push(request);

        match reply {
            Some(MockReply::Json(body)) => Ok(TransportResponse {
                status: 200,
                body: body.to_string(),
            }),
            Some(MockReply::Raw { status, body }) => Ok(TransportResponse { status, body }),
            Some(MockReply::Fail(message)) => Err(TransportError::Other(message)),
            None => Err(TransportError::Other(format!("no mock route for {url}"))),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.respond(HttpMethod::Get, url, query)
    }

    async fn post(
        &self,
        url: &str,
        body: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.respond(HttpMethod::Post, url, body)
    }
}

/// Connection wired to a fresh [`MockTransport`]
pub fn mock_connection(config: ConnectionConfig) -> (Connection, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let connection = Connection::with_transport(config, transport.clone());
    (connection, transport)
}
