//! Common test utilities for integration tests
//!
//! RSA keys are generated once per test binary. Validators are wired to a
//! [`MockTransport`] that serves the public half as the issuer would.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use gigya_auth::{
    KeyCache, TestTokenBuilder, TrustConfig, TrustValidator, VerificationKey, build_rsa_key, unmunge,
};
use gigya_client::testing::{MockTransport, mock_connection};
use gigya_client::ConnectionConfig;
use jsonwebtoken::EncodingKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{Value, json};
use std::sync::{Arc, OnceLock};

/// Own API key of the site under test
pub const SITE_API_KEY: &str = "3_site_key";

/// Key id the issuer publishes
pub const KID: &str = "k1";

/// An issuer signing key
pub struct IssuerKey {
    pub encoding: EncodingKey,
    pub public: RsaPublicKey,
}

impl IssuerKey {
    fn generate(bits: usize) -> Self {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits).expect("RSA key");
        let pem = private.to_pkcs8_pem(LineEnding::LF).expect("PKCS#8 PEM");
        Self {
            encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).expect("encoding key"),
            public: RsaPublicKey::from(&private),
        }
    }

    /// `accounts.getJWTPublicKey` response for this key
    pub fn descriptor(&self, kid: &str) -> Value {
        json!({
            "errorCode": 0,
            "statusCode": 200,
            "kid": kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            // The issuer writes the modulus in its own alphabet
            "n": unmunge(&STANDARD.encode(self.public.n().to_bytes_be())),
            "e": STANDARD.encode(self.public.e().to_bytes_be()),
        })
    }

    /// Token builder signing with this key
    pub fn token(&self, kid: &str) -> TestTokenBuilder {
        TestTokenBuilder::new()
            .api_key(SITE_API_KEY)
            .signed_with(self.encoding.clone(), kid)
    }
}

/// 2048-bit issuer key
pub fn issuer_key() -> &'static IssuerKey {
    static KEY: OnceLock<IssuerKey> = OnceLock::new();
    KEY.get_or_init(|| IssuerKey::generate(2048))
}

/// 1024-bit key, below the default minimum; only its public half is used
pub fn weak_issuer_key() -> &'static IssuerKey {
    static KEY: OnceLock<IssuerKey> = OnceLock::new();
    KEY.get_or_init(|| IssuerKey::generate(1024))
}

/// Validator with its own cache, fetching keys from a mock issuer
pub fn validator(config: TrustConfig) -> (TrustValidator, Arc<MockTransport>) {
    validator_with_cache(config, KeyCache::new())
}

/// Validator over the given cache, fetching keys from a mock issuer
pub fn validator_with_cache(config: TrustConfig, cache: KeyCache) -> (TrustValidator, Arc<MockTransport>) {
    let (connection, transport) =
        mock_connection(ConnectionConfig::builder(SITE_API_KEY).user_secret("app-secret").build());
    let validator = TrustValidator::with_cache(connection, config, Arc::new(cache));
    (validator, transport)
}

/// The issuer key as a verification key published under `kid`
pub fn verification_key(kid: &str) -> VerificationKey {
    let descriptor = issuer_key().descriptor(kid);
    build_rsa_key(
        kid,
        descriptor["n"].as_str().expect("modulus"),
        descriptor["e"].as_str().expect("exponent"),
    )
    .expect("verification key")
}

/// Rewrite a token's signature in the standard alphabet with padding
pub fn with_standard_signature(token: &str) -> String {
    let (signable, signature) = token.rsplit_once('.').expect("three segments");
    let bytes = URL_SAFE_NO_PAD.decode(signature).expect("url-safe signature");
    format!("{signable}.{}", STANDARD.encode(bytes))
}
