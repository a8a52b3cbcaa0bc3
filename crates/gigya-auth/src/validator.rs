//! Identity token validation
//!
//! Validation runs in a fixed order:
//!
//! 1. Decode header and claims without verifying anything
//! 2. Return early if validation is switched off ([`TrustConfig::skip_validation`])
//! 3. Check the issuing API key against our own key and the whitelist
//! 4. Check the header algorithm against the allow-list
//! 5. Resolve the signing key through the [`KeyCache`], fetching it from
//!    `accounts.getJWTPublicKey` on a miss
//! 6. Verify signature and expiry
//!
//! Any failure rejects the token; partially validated claims are never
//! returned.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use gigya_client::config::env;
use gigya_client::{CallOptions, ClientError, Connection, HttpMethod, Params};
use jsonwebtoken::{Algorithm, Validation, decode};
use tracing::{debug, error, info, warn};

use crate::claims::IdentityClaims;
use crate::codec::{TokenFormat, decode_unverified, verification_form};
use crate::error::{TrustError, TrustResult};
use crate::key_cache::KeyCache;
use crate::key_material::{KeyDescriptor, VerificationKey};

/// Smallest RSA modulus accepted by default
pub const DEFAULT_MIN_KEY_BITS: usize = 2048;

/// Trust settings for token validation
#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Our own API key; tokens issued for it are always acceptable
    pub api_key: String,

    /// Third-party API keys whose tokens are acceptable
    ///
    /// `None` accepts tokens issued for any API key.
    pub whitelisted_api_keys: Option<Vec<String>>,

    /// Return decoded claims without checking issuer, signature or expiry
    ///
    /// **Never enable this outside tests.** Any token, including a forged or
    /// unsigned one, is accepted. Every bypassed validation logs a warning.
    pub skip_validation: bool,

    /// Algorithms a token header may name
    pub allowed_algorithms: Vec<Algorithm>,

    /// Clock skew tolerated on `exp`
    pub leeway: Duration,

    /// Smallest acceptable RSA modulus, in bits
    pub min_key_bits: usize,
}

impl TrustConfig {
    /// Configuration for the given API key with strict defaults
    ///
    /// No whitelist, RS256 only, no leeway, 2048-bit minimum key size.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            whitelisted_api_keys: None,
            skip_validation: false,
            allowed_algorithms: vec![Algorithm::RS256],
            leeway: Duration::ZERO,
            min_key_bits: DEFAULT_MIN_KEY_BITS,
        }
    }

    /// Load from `GIGYA_API_KEY` and `GIGYA_WHITELISTED_API_KEYS`
    ///
    /// # Errors
    ///
    /// [`TrustError::Configuration`] if the API key is missing or blank.
    pub fn from_env() -> TrustResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// [`TrustError::Configuration`] if the API key is missing or blank.
    pub fn from_lookup<F>(lookup: F) -> TrustResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(env::API_KEY)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TrustError::Configuration(format!("{} is not configured", env::API_KEY))
            })?;

        let mut config = Self::new(api_key);
        if let Some(list) = lookup(env::WHITELISTED_API_KEYS).filter(|l| !l.trim().is_empty()) {
            config = config.whitelist(
                list.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(config)
    }

    /// Accept tokens issued for these API keys as well as our own
    pub fn whitelist<I, S>(mut self, api_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelisted_api_keys = Some(api_keys.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the algorithm allow-list
    ///
    /// Only asymmetric algorithms make sense here; the issuer signs with RSA.
    pub fn allowed_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Tolerate clock skew on `exp`
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Change the minimum RSA modulus size
    pub fn min_key_bits(mut self, bits: usize) -> Self {
        self.min_key_bits = bits;
        self
    }

    /// Switch validation off entirely
    ///
    /// **Test environments only.** See [`TrustConfig::skip_validation`].
    pub fn dangerously_skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    /// Whether tokens issued for `api_key` pass the tenant check
    pub fn trusts_api_key(&self, api_key: &str) -> bool {
        if api_key == self.api_key {
            return true;
        }
        match &self.whitelisted_api_keys {
            Some(whitelist) => whitelist.iter().any(|key| key == api_key),
            None => true,
        }
    }
}

/// A token that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    /// Verified claims
    pub claims: IdentityClaims,
    /// Algorithm named in the header
    pub algorithm: String,
    /// Key id from the header
    pub key_id: Option<String>,
    /// `false` when validation was skipped
    pub verified: bool,
}

/// Validates identity tokens against the issuer's published key
///
/// # Example
///
/// ```rust,no_run
/// use gigya_auth::{TokenFormat, TrustConfig, TrustValidator};
/// use gigya_client::{Connection, ConnectionConfig};
///
/// # async fn run(token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let connection = Connection::new(ConnectionConfig::builder("3_site_api_key").build())?;
/// let validator = TrustValidator::new(connection, TrustConfig::new("3_site_api_key"));
///
/// let validated = validator.validate(token, TokenFormat::Issuer).await?;
/// println!("Token belongs to {}", validated.claims.sub);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TrustValidator {
    connection: Connection,
    config: TrustConfig,
    cache: Arc<KeyCache>,
}

impl TrustValidator {
    /// Create a validator backed by the process-wide key cache
    pub fn new(connection: Connection, config: TrustConfig) -> Self {
        Self::with_cache(connection, config, KeyCache::global())
    }

    /// Create a validator with its own key cache
    pub fn with_cache(connection: Connection, config: TrustConfig, cache: Arc<KeyCache>) -> Self {
        if config.skip_validation {
            warn!("Token validation is disabled; every token will be accepted");
        }
        Self {
            connection,
            config,
            cache,
        }
    }

    /// Trust settings
    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Connection used to fetch keys
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Key cache
    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// Validate a token
    ///
    /// # Errors
    ///
    /// - [`TrustError::MalformedToken`] for undecodable tokens or a missing key id
    /// - [`TrustError::UntrustedIssuer`] for API keys outside the whitelist
    /// - [`TrustError::AlgorithmNotAllowed`] before any key is fetched
    /// - [`TrustError::KeyFetch`], [`TrustError::UnsupportedKeyType`] or
    ///   [`TrustError::KeyConstruction`] while resolving the key
    /// - [`TrustError::SignatureInvalid`] or [`TrustError::ExpiredToken`]
    pub async fn validate(&self, token: &str, format: TokenFormat) -> TrustResult<ValidatedToken> {
        let unverified = decode_unverified(token).inspect_err(|e| {
            debug!(error = %e, "Failed to decode token");
        })?;
        let header = unverified.header;

        if self.config.skip_validation {
            warn!(
                subject = %unverified.claims.sub,
                api_key = %unverified.claims.api_key,
                "Token validation skipped; returning unverified claims"
            );
            return Ok(ValidatedToken {
                claims: unverified.claims,
                algorithm: header.alg,
                key_id: header.kid,
                verified: false,
            });
        }

        if !self.config.trusts_api_key(&unverified.claims.api_key) {
            warn!(api_key = %unverified.claims.api_key, "Token issued for an untrusted API key");
            return Err(TrustError::UntrustedIssuer {
                api_key: unverified.claims.api_key,
            });
        }

        let algorithm = Algorithm::from_str(&header.alg)
            .ok()
            .filter(|alg| self.config.allowed_algorithms.contains(alg))
            .ok_or_else(|| {
                error!(
                    algorithm = %header.alg,
                    allowed = ?self.config.allowed_algorithms,
                    "Token algorithm not allowed"
                );
                TrustError::AlgorithmNotAllowed(header.alg.clone())
            })?;

        let key_id = header
            .kid
            .clone()
            .ok_or_else(|| TrustError::malformed("token header has no key id"))?;

        let key = self
            .cache
            .get_or_fetch(&key_id, || self.fetch_key(&key_id))
            .await?;
        if key.modulus_bits() < self.config.min_key_bits {
            error!(
                kid = key.kid(),
                bits = key.modulus_bits(),
                minimum = self.config.min_key_bits,
                "Verification key is too small"
            );
            return Err(TrustError::key_construction(format!(
                "{}-bit key is below the {}-bit minimum",
                key.modulus_bits(),
                self.config.min_key_bits
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        validation.leeway = self.config.leeway.as_secs();
        validation.set_required_spec_claims(&["exp", "sub"]);

        let form = verification_form(token, format)?;
        let token_data = decode::<IdentityClaims>(form.as_str(), key.decoding_key(), &validation)
            .map_err(|e| {
                warn!(error = %e, kid = %key_id, "Token verification failed");
                TrustError::from_jwt(&e)
            })?;

        debug!(
            subject = %token_data.claims.sub,
            api_key = %token_data.claims.api_key,
            kid = %key_id,
            "Token validated"
        );

        Ok(ValidatedToken {
            claims: token_data.claims,
            algorithm: header.alg,
            key_id: Some(key_id),
            verified: true,
        })
    }

    /// Fetch the issuer's current public key
    ///
    /// The issuer only publishes its latest key, so `requested` is used for
    /// logging only.
    async fn fetch_key(&self, requested: &str) -> TrustResult<VerificationKey> {
        info!(kid = requested, "Fetching token verification key");

        let response = self
            .connection
            .call(
                HttpMethod::Get,
                "accounts",
                "getJWTPublicKey",
                Params::new(),
                &CallOptions::strict().ignore_user_id(),
            )
            .await
            .inspect_err(|e| error!(error = %e, "Failed to fetch verification key"))?;

        let descriptor: KeyDescriptor = serde_json::from_value(response.clone().into_value())
            .map_err(|e| {
                ClientError::unexpected_response(format!("invalid key descriptor: {e}"), response)
            })?;

        let key = VerificationKey::from_descriptor(&descriptor)?;
        info!(kid = key.kid(), bits = key.modulus_bits(), "Fetched verification key");
        Ok(key)
    }
}
