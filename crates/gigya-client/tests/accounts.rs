//! Account lookups, caching and registration flows

mod common;

use common::{MockGigyaServer, site_config};
use gigya_client::accounts::cache_key;
use gigya_client::{AccountStore, Accounts, ClientError, MemoryAccountStore, RegistrationOptions};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

fn account_body(uid: &str) -> Value {
    json!({
        "errorCode": 0,
        "UID": uid,
        "profile": {"firstName": "jim", "lastName": "jones", "email": "JIM@example.com"},
        "data": {"plan": "basic"}
    })
}

#[tokio::test]
async fn test_find_uses_store_after_first_fetch() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.getAccountInfo", account_body("uid-1")).await;

    let store = Arc::new(MemoryAccountStore::new());
    let accounts = Accounts::new(mock.connection(site_config())).with_store(store.clone());

    let first = accounts.find("uid-1", true).await.expect("fetched");
    assert_eq!(first.full_name(), "Jim Jones");
    assert_eq!(first.email().as_deref(), Some("jim@example.com"));
    assert!(store.get(&cache_key("uid-1")).await.expect("store").is_some());

    let second = accounts.find("uid-1", true).await.expect("cached");
    assert_eq!(second.uid(), Some("uid-1"));

    let queries = mock.queries_to("accounts.getAccountInfo").await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0]["UID"], "uid-1");
    assert_eq!(queries[0]["include"], "profile,data,subscriptions,userInfo,preferences");
    assert_eq!(queries[0]["extraProfileFields"], "locale,phones");

    // Bypassing the cache goes back to the API
    accounts.find("uid-1", false).await.expect("fetched again");
    assert_eq!(mock.queries_to("accounts.getAccountInfo").await.len(), 2);
}

#[tokio::test]
async fn test_find_raises_remote_errors() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get(
        "accounts.getAccountInfo",
        json!({"errorCode": 403047, "errorMessage": "Not found"}),
    )
    .await;

    let accounts = Accounts::new(mock.connection(site_config()));
    let err = accounts.find("missing", true).await.unwrap_err();
    assert!(matches!(err, ClientError::RemoteApi { .. }));
}

#[tokio::test]
async fn test_find_by_email_strips_quotes() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.search", json!({"errorCode": 0, "results": [{"UID": "uid-2"}]}))
        .await;
    mock.mock_get("accounts.getAccountInfo", account_body("uid-2")).await;

    let accounts = Accounts::new(mock.connection(site_config()))
        .with_extra_profile_fields(["locale"]);
    let account = accounts
        .find_by_email("\"jim\"@example.com")
        .await
        .expect("search")
        .expect("found");
    assert_eq!(account.uid(), Some("uid-2"));

    let search = mock.queries_to("accounts.search").await;
    assert_eq!(
        search[0]["query"],
        r#"SELECT UID FROM accounts WHERE profile.email = "jim@example.com""#
    );
    assert_eq!(mock.queries_to("accounts.getAccountInfo").await[0]["extraProfileFields"], "locale");
}

#[tokio::test]
async fn test_find_by_email_without_results() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.search", json!({"errorCode": 0, "results": []})).await;

    let accounts = Accounts::new(mock.connection(site_config()));
    assert!(accounts.find_by_email("nobody@example.com").await.expect("search").is_none());
}

#[tokio::test]
async fn test_save_posts_sections_as_json() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.getAccountInfo", account_body("uid-3")).await;
    mock.mock_post("accounts.setAccountInfo", json!({"errorCode": 0})).await;

    let store = Arc::new(MemoryAccountStore::new());
    let accounts = Accounts::new(mock.connection(site_config())).with_store(store.clone());
    let mut account = accounts.find("uid-3", false).await.expect("fetched");
    account.set_profile_field("firstName", "Ann");
    accounts.save(&account).await.expect("saved");

    let forms = mock.forms_to("accounts.setAccountInfo").await;
    assert_eq!(forms[0]["UID"], "uid-3");
    let profile: Value = serde_json::from_str(&forms[0]["profile"]).expect("json profile");
    assert_eq!(profile["firstName"], "Ann");
    let data: Value = serde_json::from_str(&forms[0]["data"]).expect("json data");
    assert_eq!(data, json!({"plan": "basic"}));

    let cached = store.get(&cache_key("uid-3")).await.expect("store").expect("cached");
    assert_eq!(cached["profile"]["firstName"], "Ann");
}

#[tokio::test]
async fn test_register_via_notify_login() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.isAvailableLoginID", json!({"errorCode": 0, "isAvailable": true}))
        .await;
    mock.mock_get("accounts.notifyLogin", json!({"errorCode": 206001})).await;
    mock.mock_get("accounts.initRegistration", json!({"errorCode": 0, "regToken": "rt-1"}))
        .await;
    mock.mock_post("accounts.setAccountInfo", json!({"errorCode": 0})).await;
    mock.mock_get("accounts.resendVerificationCode", json!({"errorCode": 0})).await;

    let accounts = Accounts::new(mock.connection(site_config()));
    let options = RegistrationOptions::default()
        .uid("site-uid-1")
        .password("Abc123!!")
        .verified()
        .send_verification()
        .account_field("preferences", json!({"terms": {"isConsentGranted": true}}));
    let uid = accounts
        .register_via_notify_login("new@example.com", &options)
        .await
        .expect("registered");
    assert_eq!(uid, "site-uid-1");

    assert_eq!(mock.queries_to("accounts.notifyLogin").await[0]["siteUID"], "site-uid-1");

    let forms = mock.forms_to("accounts.setAccountInfo").await;
    let form = &forms[0];
    assert_eq!(form["UID"], "site-uid-1");
    assert_eq!(form["regToken"], "rt-1");
    assert_eq!(form["securityOverride"], "true");
    assert_eq!(form["isVerified"], "true");
    assert_eq!(form["newPassword"], "Abc123!!");
    assert_eq!(form["regSource"], "gigya-rs");
    let profile: Value = serde_json::from_str(&form["profile"]).expect("json profile");
    assert_eq!(profile, json!({"email": "new@example.com"}));
    let preferences: Value = serde_json::from_str(&form["preferences"]).expect("json prefs");
    assert_eq!(preferences["terms"]["isConsentGranted"], true);

    let verification = mock.queries_to("accounts.resendVerificationCode").await;
    assert_eq!(verification[0]["UID"], "site-uid-1");
    assert_eq!(verification[0]["email"], "new@example.com");
}

#[tokio::test]
async fn test_register_rejects_taken_login_id() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.isAvailableLoginID", json!({"errorCode": 0, "isAvailable": false}))
        .await;

    let accounts = Accounts::new(mock.connection(site_config()));
    let err = accounts
        .register("taken@example.com", &RegistrationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Registration(_)));
    assert!(mock.queries_to("accounts.initRegistration").await.is_empty());
}

#[tokio::test]
async fn test_register_generates_password_and_uid() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.isAvailableLoginID", json!({"errorCode": 0, "isAvailable": true}))
        .await;
    mock.mock_get("accounts.initRegistration", json!({"errorCode": 0, "regToken": "rt-2"}))
        .await;
    mock.mock_post("accounts.register", json!({"errorCode": 0, "UID": "server-uid"}))
        .await;

    let accounts = Accounts::new(mock.connection(site_config()));
    let uid = accounts
        .register("fresh@example.com", &RegistrationOptions::default().source("mobile-app"))
        .await
        .expect("registered");

    let forms = mock.forms_to("accounts.register").await;
    let form = &forms[0];
    assert_eq!(form["siteUID"], uid);
    assert_eq!(form["email"], "fresh@example.com");
    assert_eq!(form["regToken"], "rt-2");
    assert_eq!(form["regSource"], "mobile-app");
    assert!(!form["password"].is_empty());
    assert!(!form.contains_key("preferences"));
}

#[tokio::test]
async fn test_force_finalizes_pending_registration() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.isAvailableLoginID", json!({"errorCode": 0, "isAvailable": true}))
        .await;
    mock.mock_get("accounts.notifyLogin", json!({"errorCode": 0})).await;
    mock.mock_get("accounts.initRegistration", json!({"errorCode": 0, "regToken": "rt-3"}))
        .await;
    mock.mock_post("accounts.setAccountInfo", json!({"errorCode": 0})).await;
    mock.mock_get("accounts.login", json!({"errorCode": 206002, "regToken": "rt-login"}))
        .await;
    mock.mock_get("accounts.finalizeRegistration", json!({"errorCode": 206002}))
        .await;

    let accounts = Accounts::new(mock.connection(site_config()));
    accounts
        .register_via_notify_login(
            "force@example.com",
            &RegistrationOptions::default().password("pw-123456").force(),
        )
        .await
        .expect("finalized");

    let finalize = mock.queries_to("accounts.finalizeRegistration").await;
    assert_eq!(finalize[0]["regToken"], "rt-login");
}

#[tokio::test]
async fn test_failed_finalization_is_a_registration_error() {
    let mock = MockGigyaServer::start().await;
    mock.mock_get("accounts.isAvailableLoginID", json!({"errorCode": 0, "isAvailable": true}))
        .await;
    mock.mock_get("accounts.notifyLogin", json!({"errorCode": 0})).await;
    mock.mock_get("accounts.initRegistration", json!({"errorCode": 0, "regToken": "rt-4"}))
        .await;
    mock.mock_post("accounts.setAccountInfo", json!({"errorCode": 0})).await;
    mock.mock_get("accounts.login", json!({"errorCode": 206001, "regToken": "rt-login"}))
        .await;
    mock.mock_get("accounts.finalizeRegistration", json!({"errorCode": 400006}))
        .await;

    let accounts = Accounts::new(mock.connection(site_config()));
    let err = accounts
        .register_via_notify_login("force@example.com", &RegistrationOptions::default().force())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Registration(_)));
}
