//! Account records
//!
//! [`Account`] is a thin typed view over the account JSON returned by
//! `accounts.getAccountInfo`. [`Accounts`] loads, caches and saves them.

mod registration;
mod store;

pub use registration::RegistrationOptions;
pub use store::{AccountStore, MemoryAccountStore, cache_key};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::{CallOptions, Connection, Params};
use crate::error::{ClientError, ClientResult};
use crate::transport::HttpMethod;

/// Sections requested from `accounts.getAccountInfo`
pub const ACCOUNT_INCLUDE: &str = "profile,data,subscriptions,userInfo,preferences";

/// Extra profile fields requested by default
pub const DEFAULT_EXTRA_PROFILE_FIELDS: &[&str] = &["locale", "phones"];

/// An account record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account {
    details: Map<String, Value>,
}

impl Account {
    /// Wrap an account JSON object
    pub fn new(details: Map<String, Value>) -> Self {
        Self { details }
    }

    /// Wrap a JSON value; non-objects give an empty record
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(details) => Self { details },
            _ => Self::default(),
        }
    }

    /// Raw record
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    /// Mutable raw record
    pub fn details_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.details
    }

    /// Consume into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.details)
    }

    /// Account UID
    pub fn uid(&self) -> Option<&str> {
        self.details
            .get("UID")
            .and_then(Value::as_str)
            .filter(|uid| !uid.is_empty())
    }

    /// `profile` section
    pub fn profile(&self) -> Option<&Map<String, Value>> {
        self.details.get("profile").and_then(Value::as_object)
    }

    /// `data` section
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.details.get("data").and_then(Value::as_object)
    }

    /// Set a profile field, creating the section if needed
    pub fn set_profile_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let profile = self
            .details
            .entry("profile")
            .or_insert_with(|| Value::Object(Map::new()));
        if !profile.is_object() {
            *profile = Value::Object(Map::new());
        }
        if let Value::Object(map) = profile {
            map.insert(key.into(), value.into());
        }
    }

    /// Creation time, from the millisecond `createdTimestamp`
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let millis = match self.details.get("createdTimestamp")? {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        DateTime::from_timestamp_millis(millis)
    }

    fn profile_str(&self, key: &str) -> Option<&str> {
        self.profile()?.get(key)?.as_str()
    }

    /// Capitalized first name
    pub fn first_name(&self) -> Option<String> {
        self.profile_str("firstName").map(capitalize)
    }

    /// Capitalized last name
    pub fn last_name(&self) -> Option<String> {
        self.profile_str("lastName").map(capitalize)
    }

    /// First and last name separated by a space
    pub fn full_name(&self) -> String {
        [self.first_name(), self.last_name()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lower-cased email
    pub fn email(&self) -> Option<String> {
        self.profile_str("email").map(str::to_lowercase)
    }

    /// Birthday assembled from `birthYear`, `birthMonth` and `birthDay`
    pub fn birthday(&self) -> Option<NaiveDate> {
        let profile = self.profile()?;
        let part = |key: &str| profile.get(key).and_then(Value::as_i64);
        NaiveDate::from_ymd_opt(
            i32::try_from(part("birthYear")?).ok()?,
            u32::try_from(part("birthMonth")?).ok()?,
            u32::try_from(part("birthDay")?).ok()?,
        )
    }

    /// Raw gender code (`f`, `m`, `u`)
    pub fn gender(&self) -> Option<&str> {
        self.profile_str("gender")
    }

    /// Gender spelled out
    pub fn gender_string(&self) -> Option<&'static str> {
        match self.gender()? {
            "f" => Some("Female"),
            "m" => Some("Male"),
            _ => None,
        }
    }

    /// Profile locale
    pub fn locale(&self) -> Option<&str> {
        self.profile_str("locale")
    }
}

impl From<Map<String, Value>> for Account {
    fn from(details: Map<String, Value>) -> Self {
        Self::new(details)
    }
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Account lookups and updates over a connection
#[derive(Debug, Clone)]
pub struct Accounts {
    connection: Connection,
    store: Option<Arc<dyn AccountStore>>,
    extra_profile_fields: Vec<String>,
}

impl Accounts {
    /// Account service without a store
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            store: None,
            extra_profile_fields: DEFAULT_EXTRA_PROFILE_FIELDS
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
        }
    }

    /// Cache records in `store`
    pub fn with_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the extra profile fields requested on fetch
    pub fn with_extra_profile_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_profile_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Connection used for remote calls
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Find an account by UID
    ///
    /// With `use_cache` a stored record is returned without a remote call.
    /// Fetched records are written back to the store.
    ///
    /// # Errors
    ///
    /// Returns the remote or transport error of `accounts.getAccountInfo`,
    /// or a store error.
    pub async fn find(&self, uid: &str, use_cache: bool) -> ClientResult<Account> {
        if use_cache
            && let Some(store) = &self.store
            && let Some(record) = store.get(&cache_key(uid)).await?
        {
            debug!(uid = %uid, "Account served from store");
            return Ok(Account::from_value(record));
        }

        let account = self.fetch(uid).await?;
        self.write_back(&account).await?;
        Ok(account)
    }

    /// Find an account by its profile email
    ///
    /// Returns `None` when the search finds nothing or fails remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if loading the matching account fails.
    pub async fn find_by_email(&self, email: &str) -> ClientResult<Option<Account>> {
        let email = email.replace('"', "");
        let mut params = Params::new();
        params.insert(
            "query".into(),
            Value::from(format!(
                "SELECT UID FROM accounts WHERE profile.email = \"{email}\""
            )),
        );

        let response = self.connection.api_get("accounts", "search", params).await?;
        if response.is_error() {
            warn!(error_code = response.error_code(), "Account search failed");
            return Ok(None);
        }

        let uid = response
            .get("results")
            .and_then(|r| r.get(0))
            .and_then(|r| r.get("UID"))
            .and_then(Value::as_str)
            .filter(|uid| !uid.is_empty());

        match uid {
            Some(uid) => self.find(uid, true).await.map(Some),
            None => Ok(None),
        }
    }

    /// Refresh `account` from the remote API
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] for a record without UID, or
    /// the error of the remote fetch.
    pub async fn reload(&self, account: &mut Account) -> ClientResult<()> {
        let uid = account
            .uid()
            .ok_or_else(|| ClientError::configuration("cannot reload an account without UID"))?
            .to_string();
        *account = self.fetch(&uid).await?;
        self.write_back(account).await
    }

    /// Push the `profile` and `data` sections and refresh the store
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] for a record without UID, or
    /// the remote error of `accounts.setAccountInfo`.
    pub async fn save(&self, account: &Account) -> ClientResult<()> {
        let uid = account
            .uid()
            .ok_or_else(|| ClientError::configuration("cannot save an account without UID"))?;

        let mut params = Params::new();
        params.insert("UID".into(), Value::from(uid));
        for section in ["profile", "data"] {
            if let Some(value) = account.details().get(section).filter(|v| is_present(v)) {
                params.insert(section.into(), Value::String(serde_json::to_string(value)?));
            }
        }

        self.connection
            .call(
                HttpMethod::Post,
                "accounts",
                "setAccountInfo",
                params,
                &CallOptions::strict().ignore_user_id(),
            )
            .await?;
        debug!(uid = %uid, "Account saved");

        self.write_back(account).await
    }

    async fn fetch(&self, uid: &str) -> ClientResult<Account> {
        let mut params = Params::new();
        params.insert("UID".into(), Value::from(uid));
        params.insert("include".into(), Value::from(ACCOUNT_INCLUDE));
        params.insert(
            "extraProfileFields".into(),
            Value::from(self.extra_profile_fields.join(",")),
        );

        let response = self
            .connection
            .call(
                HttpMethod::Get,
                "accounts",
                "getAccountInfo",
                params,
                &CallOptions::strict().ignore_user_id(),
            )
            .await?;
        Ok(Account::new(response.into_map()))
    }

    async fn write_back(&self, account: &Account) -> ClientResult<()> {
        match (&self.store, account.uid()) {
            (Some(store), Some(uid)) => {
                store
                    .put(&cache_key(uid), Value::Object(account.details().clone()))
                    .await
            }
            _ => Ok(()),
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.trim().is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}
