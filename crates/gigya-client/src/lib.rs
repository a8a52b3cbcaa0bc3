//! # gigya-client - Remote API client for the Gigya identity platform
//!
//! Authenticated calls to the `{area}.{function}` HTTP API, a dynamic proxy
//! that turns field-access chains into those calls, and an account layer on
//! top.
//!
//! ## Architecture
//!
//! - [`config`] - Connection configuration (builder or `GIGYA_*` environment)
//! - [`transport`] - Pluggable GET/POST transport, reqwest by default
//! - [`response`] - The `errorCode`/`statusCode` response envelope
//! - [`connection`] - The remote caller: parameter injection, failure
//!   envelopes, strict mode, login
//! - [`proxy`] - Cursor-based navigation and mutation of remote data
//! - [`accounts`] - Account records, record storage and registration flows
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gigya_client::{Connection, ConnectionConfig, Params};
//!
//! # async fn run() -> gigya_client::ClientResult<()> {
//! let config = ConnectionConfig::builder("3_site_api_key")
//!     .user_key("AUserKey")
//!     .user_secret("app-secret")
//!     .datacenter("eu1")
//!     .build();
//! let connection = Connection::new(config)?;
//!
//! // Failures come back in the envelope unless strict mode is requested
//! let schema = connection.api_get("accounts", "getSchema", Params::new()).await?;
//! if schema.is_error() {
//!     eprintln!("error {}", schema.error_code());
//! }
//!
//! // The proxy fetches `accounts.getPolicies` and navigates into it
//! let policies = connection.area("accounts").get("policies").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `test-utils` - [`testing::MockTransport`], a recording transport with
//!   canned replies

pub mod accounts;
pub mod config;
pub mod connection;
pub mod error;
pub mod proxy;
pub mod response;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[doc(inline)]
pub use accounts::{Account, AccountStore, Accounts, MemoryAccountStore, RegistrationOptions};
#[doc(inline)]
pub use config::{ConnectionConfig, ConnectionConfigBuilder, SessionCredentials};
#[doc(inline)]
pub use connection::{CallOptions, Connection, Params};
#[doc(inline)]
pub use error::{ClientError, ClientResult};
#[doc(inline)]
pub use proxy::{Cursor, Field, ProxyOp, Step};
#[doc(inline)]
pub use response::{ApiResponse, TRANSPORT_FAILURE_CODE};
#[doc(inline)]
pub use transport::{HttpMethod, HttpTransport, ReqwestTransport, TransportError, TransportResponse};
