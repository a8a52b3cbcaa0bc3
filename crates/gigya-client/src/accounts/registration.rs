//! Account creation
//!
//! Two server-side flows are supported:
//!
//! - [`Accounts::register_via_notify_login`] registers a site UID first and
//!   attaches the account data afterwards. It can mark the account verified
//!   and force-finalize the registration.
//! - [`Accounts::register`] goes through `accounts.register` with a password.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::Accounts;
use crate::connection::{CallOptions, Params};
use crate::error::{ClientError, ClientResult};
use crate::response::ApiResponse;
use crate::transport::HttpMethod;

/// Registration source recorded when none is given
pub const DEFAULT_REG_SOURCE: &str = "gigya-rs";

/// `notifyLogin` code for an already registered site UID
const UID_ALREADY_REGISTERED: i64 = 206_001;
/// `finalizeRegistration` code for an account pending verification
const ACCOUNT_PENDING_VERIFICATION: i64 = 206_002;

/// Options shared by both registration flows
#[derive(Debug, Clone, Default)]
pub struct RegistrationOptions {
    /// Site UID to register; two random UUIDs when absent
    pub uid: Option<String>,
    /// Account password
    pub password: Option<String>,
    /// Registration source
    pub source: Option<String>,
    /// Account defaults; profile defaults go under `profile`
    pub account: Map<String, Value>,
    /// Send a verification email afterwards
    pub send_verification: bool,
    /// Send a password reset email afterwards
    pub send_password_change: bool,
    /// Mark the account verified (notify-login flow only)
    pub verified: bool,
    /// Log in and finalize the registration (notify-login flow only)
    pub force: bool,
    /// Log each call of the flow
    pub debug: bool,
}

impl RegistrationOptions {
    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the site UID
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Set the registration source
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set an account default
    pub fn account_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.account.insert(key.into(), value.into());
        self
    }

    /// Mark the account verified
    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Force-finalize the registration
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Send a verification email
    pub fn send_verification(mut self) -> Self {
        self.send_verification = true;
        self
    }

    /// Send a password reset email
    pub fn send_password_change(mut self) -> Self {
        self.send_password_change = true;
        self
    }

    fn call_options(&self) -> CallOptions {
        let options = CallOptions::default().ignore_user_id();
        if self.debug { options.debug(true) } else { options }
    }

    fn non_blank_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.trim().is_empty())
    }
}

fn generate_uid() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn generate_password() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

/// Serialize `key` in place when it holds a value
fn serialize_field(info: &mut Map<String, Value>, key: &str) -> ClientResult<()> {
    if let Some(value) = info.get(key).filter(|v| !v.is_null()) {
        let text = serde_json::to_string(value)?;
        info.insert(key.to_string(), Value::String(text));
    }
    Ok(())
}

/// Profile map of the account defaults with `email` set
fn profile_with_email(info: &mut Map<String, Value>, email: &str) {
    let profile = info
        .entry("profile")
        .or_insert_with(|| Value::Object(Map::new()));
    if !profile.is_object() {
        *profile = Value::Object(Map::new());
    }
    if let Value::Object(map) = profile {
        map.insert("email".into(), Value::from(email));
    }
}

impl Accounts {
    async fn step(
        &self,
        method: HttpMethod,
        function: &str,
        params: Params,
        options: &RegistrationOptions,
    ) -> ClientResult<ApiResponse> {
        self.connection()
            .call(method, "accounts", function, params, &options.call_options())
            .await
    }

    async fn ensure_available(&self, email: &str, options: &RegistrationOptions) -> ClientResult<()> {
        let mut params = Params::new();
        params.insert("loginID".into(), Value::from(email));
        let response = self
            .step(HttpMethod::Get, "isAvailableLoginID", params, options)
            .await?;

        if response.get("isAvailable").and_then(Value::as_bool) == Some(true) {
            Ok(())
        } else {
            Err(ClientError::Registration(format!(
                "login ID {email} is unavailable"
            )))
        }
    }

    async fn init_registration(&self, options: &RegistrationOptions) -> ClientResult<String> {
        let response = self
            .step(HttpMethod::Get, "initRegistration", Params::new(), options)
            .await?;
        response
            .get_str("regToken")
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Registration("could not initiate registration".into()))
    }

    async fn follow_up(&self, uid: &str, email: &str, options: &RegistrationOptions) -> ClientResult<()> {
        if options.send_verification {
            let mut params = Params::new();
            params.insert("UID".into(), Value::from(uid));
            params.insert("email".into(), Value::from(email));
            self.step(HttpMethod::Get, "resendVerificationCode", params, options)
                .await?;
        }
        if options.send_password_change {
            let mut params = Params::new();
            params.insert("UID".into(), Value::from(uid));
            params.insert("loginID".into(), Value::from(email));
            params.insert("email".into(), Value::from(email));
            self.step(HttpMethod::Get, "resetPassword", params, options)
                .await?;
        }
        Ok(())
    }

    /// Create an account by registering a site UID through `notifyLogin`
    ///
    /// Returns the site UID of the new account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Registration`] when the login ID is taken or
    /// any registration step is rejected.
    pub async fn register_via_notify_login(
        &self,
        email: &str,
        options: &RegistrationOptions,
    ) -> ClientResult<String> {
        let uid = options.uid.clone().unwrap_or_else(generate_uid);
        self.ensure_available(email, options).await?;

        let mut params = Params::new();
        params.insert("siteUID".into(), Value::from(uid.as_str()));
        let response = self
            .step(HttpMethod::Get, "notifyLogin", params, options)
            .await?;
        if !matches!(response.error_code(), 0 | UID_ALREADY_REGISTERED) {
            return Err(ClientError::Registration(format!(
                "could not register UID (error {})",
                response.error_code()
            )));
        }

        let reg_token = self.init_registration(options).await?;

        let mut info = options.account.clone();
        info.insert("UID".into(), Value::from(uid.as_str()));
        info.insert("regToken".into(), Value::from(reg_token));
        info.insert("securityOverride".into(), Value::Bool(true));
        profile_with_email(&mut info, email);
        serialize_field(&mut info, "profile")?;
        serialize_field(&mut info, "preferences")?;
        info.insert(
            "regSource".into(),
            Value::from(options.source.as_deref().unwrap_or(DEFAULT_REG_SOURCE)),
        );
        if options.verified {
            info.insert("isVerified".into(), Value::Bool(true));
        }
        if let Some(password) = options.non_blank_password() {
            info.insert("newPassword".into(), Value::from(password));
        }

        let response = self
            .step(HttpMethod::Post, "setAccountInfo", info, options)
            .await?;
        if response.is_error() {
            return Err(ClientError::Registration(format!(
                "could not store account data (error {})",
                response.error_code()
            )));
        }

        if options.force {
            self.force_finalize(email, options).await?;
        }
        self.follow_up(&uid, email, options).await?;

        info!(uid = %uid, "Account registered through notifyLogin");
        Ok(uid)
    }

    async fn force_finalize(&self, email: &str, options: &RegistrationOptions) -> ClientResult<()> {
        let mut params = Params::new();
        params.insert("loginID".into(), Value::from(email));
        if let Some(password) = options.non_blank_password() {
            params.insert("password".into(), Value::from(password));
        }
        let login = self.step(HttpMethod::Get, "login", params, options).await?;
        if login.error_code() == 0 {
            return Ok(());
        }

        debug!(error_code = login.error_code(), "Login pending, finalizing registration");
        let mut params = Params::new();
        if let Some(token) = login.get_str("regToken") {
            params.insert("regToken".into(), Value::from(token));
        }
        params.insert("include".into(), Value::from("emails, profile"));
        let response = self
            .step(HttpMethod::Get, "finalizeRegistration", params, options)
            .await?;

        if matches!(
            response.error_code(),
            0 | UID_ALREADY_REGISTERED | ACCOUNT_PENDING_VERIFICATION
        ) {
            Ok(())
        } else {
            Err(ClientError::Registration(format!(
                "unable to finalize registration (error {})",
                response.error_code()
            )))
        }
    }

    /// Create an account through `accounts.register`
    ///
    /// A password is generated when none is given. Returns the site UID of
    /// the new account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Registration`] when the login ID is taken or
    /// any registration step is rejected.
    pub async fn register(&self, email: &str, options: &RegistrationOptions) -> ClientResult<String> {
        let password = options
            .non_blank_password()
            .map_or_else(generate_password, str::to_string);
        let uid = options.uid.clone().unwrap_or_else(generate_uid);

        self.ensure_available(email, options).await?;
        let reg_token = self.init_registration(options).await?;

        let mut info = options.account.clone();
        info.insert("siteUID".into(), Value::from(uid.as_str()));
        info.insert("regToken".into(), Value::from(reg_token));
        info.insert("email".into(), Value::from(email));
        profile_with_email(&mut info, email);
        serialize_field(&mut info, "profile")?;
        serialize_field(&mut info, "preferences")?;
        serialize_field(&mut info, "data")?;
        if let Some(source) = options.source.as_deref().filter(|s| !s.trim().is_empty()) {
            info.insert("regSource".into(), Value::from(source));
        }
        info.insert("password".into(), Value::from(password));

        let response = self
            .step(HttpMethod::Post, "register", info, options)
            .await?;
        if response.is_error() {
            return Err(ClientError::Registration(format!(
                "{} (error {})",
                response.error_message().unwrap_or("registration rejected"),
                response.error_code()
            )));
        }

        self.follow_up(&uid, email, options).await?;

        info!(uid = %uid, "Account registered");
        Ok(uid)
    }
}
