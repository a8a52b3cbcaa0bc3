//! Remote caller
//!
//! A [`Connection`] sends authenticated GET/POST calls to
//! `https://{area}.{datacenter}.{base_domain}/{area}.{function}` and hands
//! back the response envelope. Every call carries the site API key; app
//! credentials and the session UID are added depending on configuration and
//! [`CallOptions`].

use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, SessionCredentials};
use crate::error::{ClientError, ClientResult};
use crate::proxy::Cursor;
use crate::response::ApiResponse;
use crate::transport::{HttpMethod, HttpTransport, ReqwestTransport};

/// Request parameters of a remote call
pub type Params = Map<String, Value>;

/// Parameter names whose values never reach the debug log
const REDACTED_PARAMS: &[&str] = &["secret", "password", "newPassword", "sessionSecret"];

/// Longest body excerpt kept in a transport failure detail
const BODY_EXCERPT_LEN: usize = 200;

/// Per-call switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Turn error envelopes into [`ClientError`]s
    pub strict: bool,
    /// Do not send the session UID even if logged in
    pub ignore_user_id: bool,
    /// Override [`ConnectionConfig::authenticate_app`] for this call
    pub authenticate_app: Option<bool>,
    /// Override [`ConnectionConfig::debug`] for this call
    pub debug: Option<bool>,
}

impl CallOptions {
    /// Options for a strict call
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Skip the session UID
    pub fn ignore_user_id(mut self) -> Self {
        self.ignore_user_id = true;
        self
    }

    /// Force application authentication on or off
    pub fn authenticate_app(mut self, enabled: bool) -> Self {
        self.authenticate_app = Some(enabled);
        self
    }

    /// Force debug logging on or off
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = Some(enabled);
        self
    }
}

/// Authenticated connection to the remote API
///
/// Cheap to clone; clones share configuration and transport.
#[derive(Debug, Clone)]
pub struct Connection {
    config: Arc<ConnectionConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl Connection {
    /// Create a connection using the default reqwest transport
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: ConnectionConfig) -> ClientResult<Self> {
        let transport = ReqwestTransport::new()
            .map_err(|e| ClientError::configuration(format!("HTTP client: {e}")))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a connection over a custom transport
    pub fn with_transport(config: ConnectionConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    /// Create a connection configured from `GIGYA_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the environment is incomplete.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ConnectionConfig::from_env()?)
    }

    /// Configuration of this connection
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Site API key
    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    /// Endpoint URL of `area.function`
    pub fn endpoint(&self, area: &str, function: &str) -> String {
        format!(
            "https://{}/{}.{}",
            self.config.host_for(area),
            area,
            function
        )
    }

    /// Copy of this connection carrying session credentials
    pub fn with_session(&self, session: SessionCredentials) -> Self {
        Self {
            config: Arc::new(self.config.with_session(session)),
            transport: Arc::clone(&self.transport),
        }
    }

    /// Proxy cursor bound to `area`
    pub fn area(&self, area: impl Into<String>) -> Cursor {
        Cursor::new(self.clone()).bind_area(area)
    }

    /// Unbound proxy cursor over this connection
    pub fn proxy(&self) -> Cursor {
        Cursor::new(self.clone())
    }

    /// Perform a remote call
    ///
    /// Transport failures and unparseable bodies are turned into the
    /// synthesized failure envelope (see
    /// [`ApiResponse::transport_failure`]). In strict mode they raise
    /// [`ClientError::Transport`] instead, and error envelopes raise
    /// [`ClientError::RemoteApi`].
    ///
    /// # Errors
    ///
    /// Only in strict mode, as described above.
    pub async fn call(
        &self,
        method: HttpMethod,
        area: &str,
        function: &str,
        mut params: Params,
        options: &CallOptions,
    ) -> ClientResult<ApiResponse> {
        let config = &self.config;
        let url = self.endpoint(area, function);

        params.insert("apiKey".into(), Value::from(config.api_key.as_str()));
        if options.authenticate_app.unwrap_or(config.authenticate_app) {
            if let Some(secret) = &config.user_secret {
                params.insert("secret".into(), Value::from(secret.expose_secret().as_str()));
            }
            if let Some(user_key) = config.user_key.as_deref().filter(|k| !k.is_empty()) {
                params.insert("userKey".into(), Value::from(user_key));
            }
        }
        if !options.ignore_user_id
            && let Some(uid) = config.session_user_id()
        {
            params.insert("UID".into(), Value::from(uid));
        }

        let pairs = to_pairs(&params);
        let debug_enabled = options.debug.unwrap_or(config.debug);
        if debug_enabled {
            debug!(
                target: "gigya::connection",
                method = %method,
                url = %url,
                params = ?redact_pairs(&pairs),
                "Sending request"
            );
        }

        let outcome = match method {
            HttpMethod::Get => self.transport.get(&url, &pairs).await,
            HttpMethod::Post => self.transport.post(&url, &pairs).await,
        };

        let (response, failure) = match outcome {
            Ok(raw) => match ApiResponse::parse(&raw.body) {
                Some(response) => (response, None),
                None => {
                    let detail = format!(
                        "HTTP {}: unparseable response body: {}",
                        raw.status,
                        excerpt(&raw.body)
                    );
                    warn!(url = %url, status = raw.status, "Remote API returned a non-JSON body");
                    (ApiResponse::transport_failure(detail.clone()), Some(detail))
                }
            },
            Err(e) => {
                let detail = e.to_string();
                warn!(url = %url, error = %detail, "Remote API call failed");
                (ApiResponse::transport_failure(detail.clone()), Some(detail))
            }
        };

        if debug_enabled {
            debug!(
                target: "gigya::connection",
                url = %url,
                error_code = response.error_code(),
                response = ?redact_map(response.as_map()),
                "Received response"
            );
        }

        if options.strict {
            if let Some(detail) = failure {
                return Err(ClientError::transport(detail, response));
            }
            if response.is_error() {
                return Err(ClientError::remote_api(response));
            }
        }

        Ok(response)
    }

    /// Non-strict GET call
    ///
    /// # Errors
    ///
    /// Never fails; failures are encoded in the returned envelope.
    pub async fn api_get(
        &self,
        area: &str,
        function: &str,
        params: Params,
    ) -> ClientResult<ApiResponse> {
        self.call(HttpMethod::Get, area, function, params, &CallOptions::default())
            .await
    }

    /// Non-strict POST call
    ///
    /// # Errors
    ///
    /// Never fails; failures are encoded in the returned envelope.
    pub async fn api_post(
        &self,
        area: &str,
        function: &str,
        params: Params,
    ) -> ClientResult<ApiResponse> {
        self.call(HttpMethod::Post, area, function, params, &CallOptions::default())
            .await
    }

    /// Log a user in and return a connection acting on their behalf
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RemoteApi`] for rejected credentials or a login
    /// response without a UID, and [`ClientError::Transport`] if the API is
    /// unreachable.
    pub async fn login(&self, login_id: &str, password: &str) -> ClientResult<Connection> {
        let mut params = Params::new();
        params.insert("loginID".into(), Value::from(login_id));
        params.insert("password".into(), Value::from(password));
        params.insert("targetEnv".into(), Value::from("mobile"));

        let response = self
            .call(
                HttpMethod::Get,
                "accounts",
                "login",
                params,
                &CallOptions::strict().ignore_user_id(),
            )
            .await?;

        let session = session_from_login(&response)
            .ok_or_else(|| ClientError::unexpected_response("login response has no UID", response.clone()))?;
        debug!(uid = %session.user_id, "Logged in");

        Ok(self.with_session(session))
    }
}

fn session_from_login(response: &ApiResponse) -> Option<SessionCredentials> {
    let user_id = response.get_str("UID")?.to_string();
    let session_info = response.get("sessionInfo");
    let field = |name: &str| {
        response
            .get_str(name)
            .or_else(|| session_info.and_then(|s| s.get(name)).and_then(Value::as_str))
            .map(str::to_string)
    };

    Some(SessionCredentials {
        user_id,
        token: field("sessionToken"),
        secret: field("sessionSecret").map(secrecy::SecretString::new),
        profile: response.get("profile").cloned(),
    })
}

/// Flatten parameters into wire pairs; nulls are dropped
fn to_pairs(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), value))
        })
        .collect()
}

fn redact_pairs(pairs: &[(String, String)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| {
            if REDACTED_PARAMS.contains(&k.as_str()) {
                (k.clone(), "[REDACTED]".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

fn redact_map(body: &Map<String, Value>) -> Map<String, Value> {
    body.iter()
        .map(|(k, v)| {
            if REDACTED_PARAMS.contains(&k.as_str()) {
                (k.clone(), Value::from("[REDACTED]"))
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}
