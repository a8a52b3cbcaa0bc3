//! Common test utilities for integration tests
//!
//! [`MockGigyaServer`] runs a wiremock server that plays the remote API.
//! Connections created through it use the real reqwest transport with the
//! `https://{area}.{dc}.gigya.com` origin rewritten to the mock server.

#![allow(dead_code)]

use async_trait::async_trait;
use gigya_client::{
    Connection, ConnectionConfig, HttpTransport, ReqwestTransport, TransportError,
    TransportResponse,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Transport that sends every request to a local mock server
#[derive(Debug)]
pub struct LocalTransport {
    inner: ReqwestTransport,
    origin: String,
}

impl LocalTransport {
    fn rewrite(&self, url: &str) -> String {
        let path = url
            .strip_prefix("https://")
            .and_then(|rest| rest.find('/').map(|i| &rest[i..]))
            .unwrap_or("/");
        format!("{}{}", self.origin, path)
    }
}

#[async_trait]
impl HttpTransport for LocalTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.inner.get(&self.rewrite(url), query).await
    }

    async fn post(
        &self,
        url: &str,
        body: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.inner.post(&self.rewrite(url), body).await
    }
}

/// Mock remote API
pub struct MockGigyaServer {
    pub server: MockServer,
}

impl MockGigyaServer {
    /// Start a new mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Connection talking to this server
    pub fn connection(&self, config: ConnectionConfig) -> Connection {
        let transport = LocalTransport {
            inner: ReqwestTransport::new().expect("reqwest client"),
            origin: self.server.uri(),
        };
        Connection::with_transport(config, Arc::new(transport))
    }

    /// Answer `GET /{function}` with a JSON body
    pub async fn mock_get(&self, function: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/{function}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer `POST /{function}` with a JSON body
    pub async fn mock_post(&self, function: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/{function}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Query parameters of every request sent to `function`
    pub async fn queries_to(&self, function: &str) -> Vec<HashMap<String, String>> {
        let wanted = format!("/{function}");
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == wanted)
            .map(|r| r.url.query_pairs().into_owned().collect())
            .collect()
    }

    /// Form bodies of every request sent to `function`
    pub async fn forms_to(&self, function: &str) -> Vec<HashMap<String, String>> {
        let wanted = format!("/{function}");
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == wanted)
            .map(|r| {
                // Reuse the URL query parser for the form-encoded body
                let mut url = r.url.clone();
                url.set_query(Some(&String::from_utf8_lossy(&r.body)));
                url.query_pairs().into_owned().collect()
            })
            .collect()
    }
}

/// Site configuration with app credentials
pub fn site_config() -> ConnectionConfig {
    ConnectionConfig::builder("3_site_key")
        .user_key("AUserKey")
        .user_secret("app-secret")
        .build()
}
