//! # gigya - Rust client for the Gigya identity platform
//!
//! One dependency for the whole toolkit:
//!
//! - [`client`] - Remote API calls, the dynamic proxy and the account layer
//! - [`auth`] - `id_token` validation and request session helpers (feature
//!   `auth`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gigya::prelude::*;
//!
//! # async fn run(token: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let connection = Connection::from_env()?;
//!
//! // Remote calls
//! let schema = connection.api_get("accounts", "getSchema", Params::new()).await?;
//!
//! // Accounts
//! let accounts = Accounts::new(connection.clone());
//! let account = accounts.find("some-uid", true).await?;
//! println!("{}", account.full_name());
//!
//! // Tokens
//! let validator = TrustValidator::new(connection, TrustConfig::from_env()?);
//! let validated = validator.validate(token, TokenFormat::Issuer).await?;
//! println!("{}", validated.claims.sub);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `auth` (default) - token validation via [`gigya_auth`]
//! - `test-utils` - `MockTransport` for tests of code built on this crate
//! - `full` - everything

#![cfg_attr(docsrs, feature(doc_cfg))]

#[doc(inline)]
pub use gigya_client as client;

#[cfg(feature = "auth")]
#[cfg_attr(docsrs, doc(cfg(feature = "auth")))]
#[doc(inline)]
pub use gigya_auth as auth;

#[doc(inline)]
pub use gigya_client::{ApiResponse, ClientError, ClientResult, Connection, ConnectionConfig};

#[cfg(feature = "auth")]
#[doc(inline)]
pub use gigya_auth::{TrustError, TrustResult};

/// Everything most applications need
pub mod prelude {
    pub use gigya_client::{
        Account, AccountStore, Accounts, ApiResponse, CallOptions, ClientError, ClientResult,
        Connection, ConnectionConfig, Cursor, Field, HttpMethod, MemoryAccountStore, Params,
        ProxyOp, RegistrationOptions, Step,
    };

    #[cfg(feature = "auth")]
    pub use gigya_auth::session::{
        Identity, RefreshPolicy, TokenLocation, TokenSources, WriteBack, authenticate,
        authenticate_with_refresh, refresh_token,
    };
    #[cfg(feature = "auth")]
    pub use gigya_auth::{
        IdentityClaims, KeyCache, TestTokenBuilder, TokenFormat, TrustConfig, TrustError,
        TrustResult, TrustValidator, ValidatedToken,
    };

    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
}
