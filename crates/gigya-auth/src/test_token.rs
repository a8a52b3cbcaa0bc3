//! Tokens shaped like the issuer's, for tests and local development

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};

use crate::codec::unmunge;
use crate::error::{TrustError, TrustResult};

/// API key used when none is given
pub const NO_API_KEY: &str = "no_api_key";

/// Issuer URL for tokens minted for `api_key`
pub fn issuer_url(api_key: &str) -> String {
    format!("https://fidm.gigya.com/jwt/{api_key}/")
}

/// Builds identity tokens
///
/// Tokens are unsigned (`alg: none`) unless a signing key is supplied, so
/// by default they only pass a validator with validation switched off.
///
/// ```rust
/// use gigya_auth::TestTokenBuilder;
///
/// let token = TestTokenBuilder::new()
///     .uid("uid-1")
///     .api_key("3_site_api_key")
///     .claim("email", "jim@example.com")
///     .build()
///     .expect("token");
/// assert_eq!(token.split('.').count(), 3);
/// ```
#[derive(Clone, Default)]
pub struct TestTokenBuilder {
    uid: Option<String>,
    api_key: Option<String>,
    claims: Map<String, Value>,
    expires_in: Option<TimeDelta>,
    signing_key: Option<(EncodingKey, String)>,
    issuer_format: bool,
}

impl std::fmt::Debug for TestTokenBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestTokenBuilder")
            .field("uid", &self.uid)
            .field("api_key", &self.api_key)
            .field("claims", &self.claims)
            .field("expires_in", &self.expires_in)
            .field("signing_kid", &self.signing_key.as_ref().map(|(_, kid)| kid))
            .field("issuer_format", &self.issuer_format)
            .finish()
    }
}

impl TestTokenBuilder {
    /// Start a builder with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Subject; a random UUID when unset
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// API key the token claims to be issued for
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a claim; explicit claims win over generated defaults
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Lifetime from now; negative values mint an expired token
    pub fn expires_in(mut self, lifetime: TimeDelta) -> Self {
        self.expires_in = Some(lifetime);
        self
    }

    /// Sign with RS256 and put `kid` in the header
    pub fn signed_with(mut self, key: EncodingKey, kid: impl Into<String>) -> Self {
        self.signing_key = Some((key, kid.into()));
        self
    }

    /// Write the token in the issuer's alphabet
    pub fn issuer_format(mut self, enabled: bool) -> Self {
        self.issuer_format = enabled;
        self
    }

    /// The claims the token will carry
    pub fn claims(&self) -> Map<String, Value> {
        let uid = self
            .uid
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let api_key = self
            .claims
            .get("apiKey")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.api_key.clone())
            .unwrap_or_else(|| NO_API_KEY.to_string());
        let now = Utc::now();

        let mut claims = self.claims.clone();
        claims.insert("sub".into(), Value::from(uid.as_str()));
        claims.insert("apiKey".into(), Value::from(api_key.as_str()));
        claims
            .entry("iss")
            .or_insert_with(|| Value::from(issuer_url(&api_key)));
        claims
            .entry("iat")
            .or_insert_with(|| json!((now - TimeDelta::seconds(10)).timestamp()));
        match self.expires_in {
            Some(lifetime) => {
                claims.insert("exp".into(), json!((now + lifetime).timestamp()));
            }
            None => {
                claims
                    .entry("exp")
                    .or_insert_with(|| json!((now + TimeDelta::hours(1)).timestamp()));
            }
        }
        claims
            .entry("firstName")
            .or_insert_with(|| Value::from(format!("Jim{}", fastrand::u32(0..10_000_000))));
        claims
            .entry("lastName")
            .or_insert_with(|| Value::from(format!("Jimmersly{}", fastrand::u32(0..10_000_000))));
        claims
            .entry("email")
            .or_insert_with(|| Value::from(format!("example+{uid}@example.com")));
        claims
    }

    /// Mint the token
    ///
    /// # Errors
    ///
    /// [`TrustError::KeyConstruction`] if signing fails.
    pub fn build(&self) -> TrustResult<String> {
        let claims = self.claims();

        let token = match &self.signing_key {
            Some((key, kid)) => {
                let mut header = Header::new(Algorithm::RS256);
                header.kid = Some(kid.clone());
                encode(&header, &claims, key)
                    .map_err(|e| TrustError::key_construction(format!("signing failed: {e}")))?
            }
            None => {
                let header = json!({"alg": "none", "typ": "JWT"});
                format!(
                    "{}.{}.",
                    URL_SAFE_NO_PAD.encode(header.to_string()),
                    URL_SAFE_NO_PAD.encode(Value::Object(claims).to_string())
                )
            }
        };

        Ok(if self.issuer_format {
            unmunge(&token)
        } else {
            token
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_unverified;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_mimic_issuer() {
        let claims = TestTokenBuilder::new().uid("uid-1").claims();

        assert_eq!(claims["sub"], "uid-1");
        assert_eq!(claims["apiKey"], NO_API_KEY);
        assert_eq!(claims["iss"], "https://fidm.gigya.com/jwt/no_api_key/");
        assert_eq!(claims["email"], "example+uid-1@example.com");
        assert!(claims["firstName"].as_str().is_some_and(|n| n.starts_with("Jim")));
        assert!(claims["lastName"].as_str().is_some_and(|n| n.starts_with("Jimmersly")));

        let iat = claims["iat"].as_i64().expect("iat");
        let exp = claims["exp"].as_i64().expect("exp");
        assert_eq!(exp - iat, 3610);
    }

    #[test]
    fn test_explicit_claims_win() {
        let claims = TestTokenBuilder::new()
            .api_key("3_site")
            .claim("firstName", "Ann")
            .claim("iss", "https://example.com/")
            .expires_in(TimeDelta::seconds(-60))
            .claims();

        assert_eq!(claims["firstName"], "Ann");
        assert_eq!(claims["iss"], "https://example.com/");
        assert!(claims["exp"].as_i64().expect("exp") < Utc::now().timestamp());
        assert!(claims["sub"].as_str().is_some_and(|s| s.len() == 36));
    }

    #[test]
    fn test_unsigned_token_decodes() {
        let token = TestTokenBuilder::new()
            .uid("uid-2")
            .api_key("3_site")
            .issuer_format(true)
            .build()
            .expect("token");

        assert!(token.ends_with('.'));
        let decoded = decode_unverified(&token).expect("decodes");
        assert_eq!(decoded.header.alg, "none");
        assert_eq!(decoded.claims.sub, "uid-2");
        assert_eq!(decoded.claims.api_key, "3_site");
    }
}
