//! End-to-end token validation against a mock issuer

mod common;

use chrono::TimeDelta;
use common::{
    KID, SITE_API_KEY, issuer_key, validator, validator_with_cache, verification_key, weak_issuer_key,
    with_standard_signature,
};
use gigya_auth::{KeyCache, TokenFormat, TrustConfig, TrustError, unmunge};
use tokio::sync::Notify;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_signed_token_validates_and_key_is_fetched_once() {
    let (validator, transport) = validator(TrustConfig::new(SITE_API_KEY));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor(KID));

    let token = issuer_key()
        .token(KID)
        .uid("uid-1")
        .claim("email", "jim@example.com")
        .build()
        .expect("token");

    for _ in 0..3 {
        let validated = validator
            .validate(&token, TokenFormat::Standard)
            .await
            .expect("valid token");
        assert!(validated.verified);
        assert_eq!(validated.algorithm, "RS256");
        assert_eq!(validated.key_id.as_deref(), Some(KID));
        assert_eq!(validated.claims.sub, "uid-1");
        assert_eq!(validated.claims.email(), Some("jim@example.com"));
    }

    assert_eq!(transport.calls_to("accounts.getJWTPublicKey"), 1);
    let fetch = transport.last_request().expect("key fetch");
    assert_eq!(fetch.param("apiKey"), Some(SITE_API_KEY));
    assert_eq!(fetch.param("UID"), None);
}

#[tokio::test]
async fn test_issuer_format_token_validates() {
    let (validator, transport) = validator(TrustConfig::new(SITE_API_KEY));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor(KID));

    let signed = issuer_key().token(KID).uid("uid-2").build().expect("token");
    let standard = with_standard_signature(&signed);
    let issuer = unmunge(&standard);

    let from_issuer = validator
        .validate(&issuer, TokenFormat::Issuer)
        .await
        .expect("issuer format");
    assert_eq!(from_issuer.claims.sub, "uid-2");

    // Standard-alphabet signatures are accepted as they are
    let from_standard = validator
        .validate(&standard, TokenFormat::Standard)
        .await
        .expect("standard alphabet");
    assert_eq!(from_standard.claims.sub, "uid-2");
}

#[tokio::test]
async fn test_tenant_check() {
    let (validator, transport) =
        validator(TrustConfig::new(SITE_API_KEY).whitelist(["3_partner_key"]));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor(KID));

    // Own key passes even though it is not listed
    let own = issuer_key().token(KID).build().expect("token");
    assert!(validator.validate(&own, TokenFormat::Standard).await.is_ok());

    let partner = issuer_key().token(KID).api_key("3_partner_key").build().expect("token");
    assert!(validator.validate(&partner, TokenFormat::Standard).await.is_ok());

    let stranger = issuer_key().token(KID).api_key("3_stranger_key").build().expect("token");
    let err = validator
        .validate(&stranger, TokenFormat::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, TrustError::UntrustedIssuer { ref api_key } if api_key == "3_stranger_key"));
}

#[tokio::test]
async fn test_own_key_passes_with_empty_whitelist() {
    let (validator, transport) =
        validator(TrustConfig::new(SITE_API_KEY).whitelist(Vec::<String>::new()));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor(KID));

    let token = issuer_key().token(KID).build().expect("token");
    assert!(validator.validate(&token, TokenFormat::Standard).await.is_ok());
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (validator, transport) = validator(TrustConfig::new(SITE_API_KEY));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor(KID));

    let token = issuer_key()
        .token(KID)
        .expires_in(TimeDelta::seconds(-120))
        .build()
        .expect("token");
    let err = validator.validate(&token, TokenFormat::Standard).await.unwrap_err();
    assert!(matches!(err, TrustError::ExpiredToken));

    // Within the configured leeway the same token is fine
    let (lenient, transport) =
        common::validator(TrustConfig::new(SITE_API_KEY).leeway(Duration::from_secs(600)));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor(KID));
    assert!(lenient.validate(&token, TokenFormat::Standard).await.is_ok());
}

#[tokio::test]
async fn test_tampered_payload_fails_signature_check() {
    let (validator, transport) = validator(TrustConfig::new(SITE_API_KEY));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor(KID));

    let genuine = issuer_key().token(KID).uid("uid-3").build().expect("token");
    let forged_claims = issuer_key().token(KID).uid("admin").build().expect("token");

    let mut segments: Vec<&str> = genuine.split('.').collect();
    segments[1] = forged_claims.split('.').nth(1).expect("payload");
    let forged = segments.join(".");

    let err = validator.validate(&forged, TokenFormat::Standard).await.unwrap_err();
    assert!(matches!(err, TrustError::SignatureInvalid(_)));
}

#[tokio::test]
async fn test_algorithm_outside_allow_list_is_rejected_before_fetch() {
    let (validator, transport) = validator(TrustConfig::new(SITE_API_KEY).allowed_algorithms(vec![
        jsonwebtoken::Algorithm::PS256,
    ]));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor(KID));

    let token = issuer_key().token(KID).build().expect("token");
    let err = validator.validate(&token, TokenFormat::Standard).await.unwrap_err();

    assert!(matches!(err, TrustError::AlgorithmNotAllowed(ref alg) if alg == "RS256"));
    assert_eq!(transport.calls_to("accounts.getJWTPublicKey"), 0);
}

#[tokio::test]
async fn test_weak_key_is_rejected() {
    let (validator, transport) = validator(TrustConfig::new(SITE_API_KEY));
    transport.reply_json("accounts.getJWTPublicKey", weak_issuer_key().descriptor(KID));

    // Rejected on size alone, before any signature check
    let token = issuer_key().token(KID).build().expect("token");
    let err = validator.validate(&token, TokenFormat::Standard).await.unwrap_err();
    assert!(matches!(err, TrustError::KeyConstruction(ref message) if message.contains("1024")));
}

#[tokio::test]
async fn test_key_is_cached_under_published_kid() {
    let (validator, transport) = validator(TrustConfig::new(SITE_API_KEY));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor("current"));

    let token = issuer_key().token("rotated-away").build().expect("token");
    for _ in 0..5 {
        assert!(validator.validate(&token, TokenFormat::Standard).await.is_ok());
    }

    assert!(validator.cache().get("current").await.is_some());
    assert!(validator.cache().get("rotated-away").await.is_none());
    // The unpublished id resolves through its alias
    assert_eq!(transport.calls_to("accounts.getJWTPublicKey"), 1);
}

#[tokio::test]
async fn test_unknown_kid_is_refetched_once_its_alias_lapses() {
    let (validator, transport) =
        validator_with_cache(TrustConfig::new(SITE_API_KEY), KeyCache::with_alias_ttl(Duration::ZERO));
    transport.reply_json("accounts.getJWTPublicKey", issuer_key().descriptor("current"));

    let token = issuer_key().token("rotated-away").build().expect("token");
    for _ in 0..3 {
        assert!(validator.validate(&token, TokenFormat::Standard).await.is_ok());
    }

    assert_eq!(transport.calls_to("accounts.getJWTPublicKey"), 3);
    assert_eq!(validator.cache().len().await, 1);
}

#[tokio::test]
async fn test_misses_for_distinct_kids_do_not_wait_on_each_other() {
    let cache = KeyCache::new();
    let release = Notify::new();

    // The first fetch only completes once the second one has
    let first = cache.get_or_fetch("first", || async {
        release.notified().await;
        Ok(verification_key("first"))
    });
    let second = async {
        let key = cache
            .get_or_fetch("second", || async { Ok(verification_key("second")) })
            .await;
        release.notify_one();
        key
    };

    let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(first, second)
    })
    .await
    .expect("fetches for different ids ran concurrently");

    assert_eq!(first.expect("first key").kid(), "first");
    assert_eq!(second.expect("second key").kid(), "second");
    assert_eq!(cache.len().await, 2);
}

#[tokio::test]
async fn test_malformed_tokens() {
    let (validator, transport) = validator(TrustConfig::new(SITE_API_KEY));

    for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.sig"] {
        let err = validator.validate(token, TokenFormat::Standard).await.unwrap_err();
        assert!(matches!(err, TrustError::MalformedToken(_)), "{token:?}: {err}");
    }
    assert!(transport.requests().is_empty());
}
