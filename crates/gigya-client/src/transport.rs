//! HTTP transport abstraction
//!
//! The remote caller never talks to reqwest directly. It goes through the
//! [`HttpTransport`] trait so that tests (and callers with special needs such
//! as custom TLS or deadlines) can substitute their own implementation.
//!
//! The default [`ReqwestTransport`] is configured to:
//! - NOT follow redirects
//! - time out after 30 seconds
//! - use rustls for TLS

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Default request timeout of [`ReqwestTransport`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method of a remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Parameters travel in the query string
    Get,
    /// Parameters travel as a form-encoded body
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// Raw response of a transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

/// Error type for transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Request execution failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response body could not be read
    #[error("Failed to read response body: {0}")]
    BodyRead(String),

    /// Any other transport failure (used by custom transports)
    #[error("{0}")]
    Other(String),
}

/// Pluggable GET/POST client used by [`Connection`](crate::Connection)
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Issue a GET request with the given query parameters
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;

    /// Issue a POST request with the given form body parameters
    async fn post(
        &self,
        url: &str,
        body: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// Transport backed by a reqwest client
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the default timeout and redirects disabled
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self { inner })
    }

    /// Create from an existing reqwest client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }

    async fn read(response: reqwest::Response) -> Result<TransportResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::BodyRead(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("inner", &"<reqwest::Client>")
            .finish()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let response = self.inner.get(url).query(query).send().await?;
        Self::read(response).await
    }

    async fn post(
        &self,
        url: &str,
        body: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let response = self.inner.post(url).form(body).send().await?;
        Self::read(response).await
    }
}
