//! Error types for token trust validation

use gigya_client::ClientError;
use thiserror::Error;

/// Result type for trust operations
pub type TrustResult<T> = std::result::Result<T, TrustError>;

/// Why a token was not trusted
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrustError {
    /// The token is not a decodable three-segment JWT
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The token was issued for an API key outside the whitelist
    #[error("Untrusted issuer API key: {api_key}")]
    UntrustedIssuer { api_key: String },

    /// The published key is not an RSA key
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The modulus/exponent pair does not form a usable key
    #[error("Key construction failed: {0}")]
    KeyConstruction(String),

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    /// The token has expired
    #[error("Token expired")]
    ExpiredToken,

    /// The header names an algorithm outside the allow-list
    #[error("Algorithm not allowed: {0}")]
    AlgorithmNotAllowed(String),

    /// Fetching the verification key failed
    #[error("Key fetch failed: {0}")]
    KeyFetch(#[from] ClientError),

    /// Requesting a fresh token failed
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TrustError {
    /// Create a malformed token error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedToken(message.into())
    }

    /// Create a key construction error
    pub fn key_construction(message: impl Into<String>) -> Self {
        Self::KeyConstruction(message.into())
    }

    /// Map a jsonwebtoken failure onto the trust taxonomy
    pub fn from_jwt(error: &jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match error.kind() {
            ErrorKind::ExpiredSignature => Self::ExpiredToken,
            ErrorKind::InvalidSignature => Self::SignatureInvalid(error.to_string()),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::AlgorithmNotAllowed(error.to_string())
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::MissingRequiredClaim(_) => Self::MalformedToken(error.to_string()),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                Self::KeyConstruction(error.to_string())
            }
            _ => Self::SignatureInvalid(error.to_string()),
        }
    }

    /// Whether the failure is the token's fault rather than ours
    pub fn is_token_rejection(&self) -> bool {
        !matches!(self, Self::KeyFetch(_) | Self::Configuration(_) | Self::TokenRefresh(_))
    }
}
