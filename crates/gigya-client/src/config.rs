//! Connection configuration
//!
//! A [`ConnectionConfig`] is immutable once a [`Connection`](crate::Connection)
//! owns it. Logging in produces a new config with session credentials merged
//! in rather than mutating the existing one.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Base domain of the remote API
pub const DEFAULT_BASE_DOMAIN: &str = "gigya.com";

/// Datacenter used when none is configured
pub const DEFAULT_DATACENTER: &str = "us1";

/// Environment variable names read by [`ConnectionConfig::from_env`]
pub mod env {
    /// Site API key
    pub const API_KEY: &str = "GIGYA_API_KEY";
    /// Application user key
    pub const USER_KEY: &str = "GIGYA_USER_KEY";
    /// Application (or partner) secret
    pub const USER_SECRET: &str = "GIGYA_USER_SECRET";
    /// Datacenter, e.g. `us1`, `eu1`
    pub const DATACENTER: &str = "GIGYA_DATACENTER";
    /// `1` turns on connection debug logging
    pub const DEBUG_CONNECTION: &str = "GIGYA_DEBUG_CONNECTION";
    /// Comma separated list of trusted third-party API keys
    pub const WHITELISTED_API_KEYS: &str = "GIGYA_WHITELISTED_API_KEYS";
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Site API key, sent with every call
    pub api_key: String,
    /// Application user key
    #[serde(default)]
    pub user_key: Option<String>,
    /// Application secret (zeroized on drop, redacted in Debug output)
    #[serde(
        default,
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub user_secret: Option<SecretString>,
    /// Datacenter prefix of the API host
    #[serde(default = "default_datacenter")]
    pub datacenter: String,
    /// Base domain of the API host
    #[serde(default = "default_base_domain")]
    pub base_domain: String,
    /// Session credentials of a logged-in user
    #[serde(default)]
    pub session: Option<SessionCredentials>,
    /// Send the application secret and user key with each call
    #[serde(default = "default_authenticate_app")]
    pub authenticate_app: bool,
    /// Log every request and response at debug level
    #[serde(default)]
    pub debug: bool,
}

/// Credentials obtained from a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCredentials {
    /// Account UID
    pub user_id: String,
    /// Session token
    pub token: Option<String>,
    /// Session secret
    #[serde(
        default,
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub secret: Option<SecretString>,
    /// Profile returned by the login call
    #[serde(default)]
    pub profile: Option<serde_json::Value>,
}

fn default_datacenter() -> String {
    DEFAULT_DATACENTER.to_string()
}

fn default_base_domain() -> String {
    DEFAULT_BASE_DOMAIN.to_string()
}

fn default_authenticate_app() -> bool {
    true
}

fn serialize_optional_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(SecretString::new))
}

impl ConnectionConfig {
    /// Start building a configuration for the given API key
    pub fn builder(api_key: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(api_key)
    }

    /// Load configuration from `GIGYA_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `GIGYA_API_KEY` is missing or blank.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API key variable is missing or blank.
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = non_blank(env::API_KEY).ok_or_else(|| {
            ClientError::configuration_with_key("API key is not configured", env::API_KEY)
        })?;

        let mut builder = Self::builder(api_key)
            .datacenter(non_blank(env::DATACENTER).unwrap_or_else(default_datacenter))
            .debug(lookup(env::DEBUG_CONNECTION).as_deref() == Some("1"));
        if let Some(user_key) = non_blank(env::USER_KEY) {
            builder = builder.user_key(user_key);
        }
        if let Some(secret) = non_blank(env::USER_SECRET) {
            builder = builder.user_secret(secret);
        }

        Ok(builder.build())
    }

    /// Host the calls for `area` are sent to
    pub fn host_for(&self, area: &str) -> String {
        format!("{}.{}.{}", area, self.datacenter, self.base_domain)
    }

    /// Copy of this configuration with session credentials merged in
    pub fn with_session(&self, session: SessionCredentials) -> Self {
        Self {
            session: Some(session),
            ..self.clone()
        }
    }

    /// UID of the logged-in user, if any
    pub fn session_user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }
}

/// Builder for [`ConnectionConfig`]
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            config: ConnectionConfig {
                api_key: api_key.into(),
                user_key: None,
                user_secret: None,
                datacenter: default_datacenter(),
                base_domain: default_base_domain(),
                session: None,
                authenticate_app: true,
                debug: false,
            },
        }
    }

    /// Set the application user key
    pub fn user_key(mut self, user_key: impl Into<String>) -> Self {
        self.config.user_key = Some(user_key.into());
        self
    }

    /// Set the application secret
    pub fn user_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.user_secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Set the datacenter
    pub fn datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.config.datacenter = datacenter.into();
        self
    }

    /// Override the base domain
    pub fn base_domain(mut self, base_domain: impl Into<String>) -> Self {
        self.config.base_domain = base_domain.into();
        self
    }

    /// Attach session credentials
    pub fn session(mut self, session: SessionCredentials) -> Self {
        self.config.session = Some(session);
        self
    }

    /// Enable or disable application authentication
    pub fn authenticate_app(mut self, enabled: bool) -> Self {
        self.config.authenticate_app = enabled;
        self
    }

    /// Enable or disable connection debug logging
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Finish building
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}
