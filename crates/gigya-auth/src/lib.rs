//! # gigya-auth - Identity token trust for the Gigya platform
//!
//! Validates the identity tokens (`id_token`) the platform issues after a
//! login, resolving the issuer's RSA signing key through the remote API and
//! caching it for the life of the process.
//!
//! ## Architecture
//!
//! - [`codec`] - Token segments and the issuer's signature alphabet
//! - [`key_material`] - RSA verification keys from issuer key descriptors
//! - [`key_cache`] - Process-wide key cache with a fetch gate
//! - [`claims`] - Identity claims
//! - [`validator`] - Trust settings and the validation pipeline
//! - [`session`] - Token extraction, authentication and refresh for request
//!   handlers
//! - [`test_token`] - Tokens shaped like the issuer's, for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gigya_auth::session::{TokenSources, authenticate};
//! use gigya_auth::{TokenFormat, TrustConfig, TrustValidator};
//! use gigya_client::Connection;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = TrustValidator::new(Connection::from_env()?, TrustConfig::from_env()?);
//!
//! let sources = TokenSources::new().authorization("Bearer eyJhbGciOi...");
//! match authenticate(&validator, &sources, TokenFormat::Issuer).await {
//!     Some(identity) => println!("Signed in as {}", identity.uid()),
//!     None => println!("Anonymous request"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! - Only algorithms on the allow-list are accepted (RS256 by default); the
//!   header's `alg` is never trusted on its own
//! - Keys below 2048 bits are rejected unless configured otherwise
//! - [`TrustConfig::dangerously_skip_validation`] accepts every token and is
//!   meant for test environments only

pub mod claims;
pub mod codec;
pub mod error;
pub mod key_cache;
pub mod key_material;
pub mod session;
pub mod test_token;
pub mod validator;

#[doc(inline)]
pub use claims::IdentityClaims;
#[doc(inline)]
pub use codec::{TokenFormat, munge, reformat, unmunge};
#[doc(inline)]
pub use error::{TrustError, TrustResult};
#[doc(inline)]
pub use key_cache::KeyCache;
#[doc(inline)]
pub use key_material::{KeyDescriptor, VerificationKey, build_rsa_key};
#[doc(inline)]
pub use session::{Identity, RefreshPolicy, TokenLocation, TokenSources};
#[doc(inline)]
pub use test_token::TestTokenBuilder;
#[doc(inline)]
pub use validator::{TrustConfig, TrustValidator, ValidatedToken};
