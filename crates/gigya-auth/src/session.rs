//! Request-side helpers: finding the token, authenticating it and keeping it
//! fresh
//!
//! Nothing here depends on a web framework. Callers copy the relevant parts
//! of the request into [`TokenSources`] and apply the [`WriteBack`] of a
//! refreshed token to their response themselves.

use chrono::{DateTime, TimeDelta, Utc};
use gigya_client::{Connection, Params};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::claims::IdentityClaims;
use crate::codec::TokenFormat;
use crate::error::{TrustError, TrustResult};
use crate::validator::{TrustValidator, ValidatedToken};

/// Query parameter, cookie and session key holding the token
pub const TOKEN_PARAM: &str = "gigya_token";

/// Response header carrying a refreshed token
pub const SET_TOKEN_HEADER: &str = "X-Set-Authorization-Token";

/// Response header carrying the refreshed token's expiry (epoch seconds)
pub const SET_TOKEN_EXPIRATION_HEADER: &str = "X-Set-Authorization-Token-Expiration";

/// Where a token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenLocation {
    /// `Authorization` header
    Header,
    /// Query or form parameter
    Param,
    /// Cookie
    Cookie,
    /// Server-side session
    Session,
}

/// Token candidates taken from a request
#[derive(Debug, Clone, Default)]
pub struct TokenSources {
    /// Bearer token from the `Authorization` header
    pub header: Option<String>,
    /// Query or form parameter
    pub param: Option<String>,
    /// Cookie value
    pub cookie: Option<String>,
    /// Session value
    pub session: Option<String>,
}

impl TokenSources {
    /// No candidates
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the token from a raw `Authorization` header value
    ///
    /// Accepts `Bearer <token>`, `Token <token>` and `Token token="<token>"`.
    /// Other schemes are ignored.
    pub fn authorization(mut self, value: &str) -> Self {
        self.header = parse_authorization(value);
        self
    }

    /// Token from the `gigya_token` parameter
    pub fn param(mut self, token: impl Into<String>) -> Self {
        self.param = Some(token.into());
        self
    }

    /// Token from the `gigya_token` cookie
    pub fn cookie(mut self, token: impl Into<String>) -> Self {
        self.cookie = Some(token.into());
        self
    }

    /// Token from the `gigya_token` session entry
    pub fn session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    /// First non-blank token: header, then parameter, cookie, session
    pub fn extract(&self) -> Option<(&str, TokenLocation)> {
        [
            (&self.header, TokenLocation::Header),
            (&self.param, TokenLocation::Param),
            (&self.cookie, TokenLocation::Cookie),
            (&self.session, TokenLocation::Session),
        ]
        .into_iter()
        .find_map(|(candidate, location)| {
            candidate
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(|token| (token, location))
        })
    }
}

fn parse_authorization(value: &str) -> Option<String> {
    let (scheme, rest) = value.trim().split_once(' ')?;
    let rest = rest.trim();
    if scheme.eq_ignore_ascii_case("bearer") {
        return Some(rest.to_string());
    }
    if scheme.eq_ignore_ascii_case("token") {
        let token = rest
            .strip_prefix("token=")
            .map(|quoted| quoted.split(',').next().unwrap_or_default().trim_matches('"'))
            .unwrap_or(rest);
        return Some(token.to_string());
    }
    None
}

/// When and how tokens are refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Refresh tokens issued longer ago than this; `None` never refreshes
    pub refresh_after: Option<TimeDelta>,
    /// Refreshed tokens expire with the original one instead of getting a
    /// full new lifetime
    pub decay: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            refresh_after: None,
            decay: true,
        }
    }
}

impl RefreshPolicy {
    /// Refresh tokens older than `age`
    pub fn after(age: TimeDelta) -> Self {
        Self {
            refresh_after: Some(age),
            ..Self::default()
        }
    }

    /// Give refreshed tokens a full lifetime every time
    pub fn without_decay(mut self) -> Self {
        self.decay = false;
        self
    }

    /// Whether a token with these claims should be refreshed at `now`
    pub fn needs_refresh(&self, claims: &IdentityClaims, now: DateTime<Utc>) -> bool {
        let Some(refresh_after) = self.refresh_after else {
            return false;
        };
        claims
            .issued_at()
            .is_some_and(|issued| issued + refresh_after < now)
    }

    /// Lifetime in seconds to request for the refreshed token
    pub fn lifetime_secs(&self, claims: &IdentityClaims, now: DateTime<Utc>) -> i64 {
        if self.decay {
            claims.exp - now.timestamp()
        } else {
            claims.exp - claims.iat
        }
    }
}

/// A token obtained from `accounts.getJWT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// The new token
    pub token: String,
    /// When it expires
    pub expires_at: DateTime<Utc>,
}

/// How a refreshed token goes back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteBack {
    /// Set these response headers
    Headers(Vec<(&'static str, String)>),
    /// Overwrite the [`TOKEN_PARAM`] cookie
    Cookie(String),
    /// Overwrite the [`TOKEN_PARAM`] session entry
    Session(String),
    /// Nothing can be written back; the client keeps sending the old token
    Unavailable,
}

impl RefreshedToken {
    /// What to send back, given where the old token came from
    pub fn write_back(&self, location: TokenLocation) -> WriteBack {
        match location {
            TokenLocation::Header => WriteBack::Headers(vec![
                (SET_TOKEN_HEADER, self.token.clone()),
                (SET_TOKEN_EXPIRATION_HEADER, self.expires_at.timestamp().to_string()),
            ]),
            TokenLocation::Cookie => WriteBack::Cookie(self.token.clone()),
            TokenLocation::Session => WriteBack::Session(self.token.clone()),
            TokenLocation::Param => WriteBack::Unavailable,
        }
    }
}

/// Ask the issuer for a fresh token carrying the same profile fields
///
/// # Errors
///
/// [`TrustError::TokenRefresh`] if no `id_token` comes back.
pub async fn refresh_token(
    connection: &Connection,
    claims: &IdentityClaims,
    policy: &RefreshPolicy,
) -> TrustResult<RefreshedToken> {
    let now = Utc::now();
    let lifetime = policy.lifetime_secs(claims, now);

    let mut params = Params::new();
    params.insert("targetUID".into(), Value::from(claims.sub.as_str()));
    params.insert("fields".into(), Value::from(claims.profile_field_names().join(",")));
    params.insert("expiration".into(), Value::from(lifetime));

    let response = connection
        .api_get("accounts", "getJWT", params)
        .await
        .map_err(|e| TrustError::TokenRefresh(e.to_string()))?;
    let token = response
        .get_str("id_token")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            warn!(
                subject = %claims.sub,
                error_code = response.error_code(),
                "Token refresh returned no token"
            );
            TrustError::TokenRefresh(format!(
                "Unable to refresh token (error {}: {})",
                response.error_code(),
                response.error_message().unwrap_or("no message")
            ))
        })?;

    debug!(subject = %claims.sub, lifetime, "Token refreshed");
    Ok(RefreshedToken {
        token: token.to_string(),
        expires_at: now + TimeDelta::seconds(lifetime),
    })
}

/// An authenticated request
#[derive(Debug, Clone)]
pub struct Identity {
    /// The token that was validated
    pub token: String,
    /// Where it was found
    pub location: TokenLocation,
    /// Validation result
    pub validated: ValidatedToken,
    /// Set when the token was replaced during authentication
    pub refreshed: Option<RefreshedToken>,
}

impl Identity {
    /// Account UID
    pub fn uid(&self) -> &str {
        &self.validated.claims.sub
    }

    /// Verified claims
    pub fn claims(&self) -> &IdentityClaims {
        &self.validated.claims
    }

    /// Write-back for a refreshed token, if there is one
    pub fn write_back(&self) -> Option<WriteBack> {
        self.refreshed
            .as_ref()
            .map(|refreshed| refreshed.write_back(self.location))
    }
}

/// Authenticate a request
///
/// Returns `None` when there is no token or it fails validation; the reason
/// is logged.
pub async fn authenticate(
    validator: &TrustValidator,
    sources: &TokenSources,
    format: TokenFormat,
) -> Option<Identity> {
    let Some((token, location)) = sources.extract() else {
        debug!("No token supplied");
        return None;
    };

    match validator.validate(token, format).await {
        Ok(validated) => Some(Identity {
            token: token.to_string(),
            location,
            validated,
            refreshed: None,
        }),
        Err(e) => {
            log_rejection(&e, location);
            None
        }
    }
}

/// Authenticate a request, refreshing the token when the policy says so
///
/// A refreshed token is validated again before it replaces the original. If
/// refreshing fails the original identity is kept.
pub async fn authenticate_with_refresh(
    validator: &TrustValidator,
    sources: &TokenSources,
    format: TokenFormat,
    policy: &RefreshPolicy,
) -> Option<Identity> {
    let identity = authenticate(validator, sources, format).await?;
    if !policy.needs_refresh(identity.claims(), Utc::now()) {
        return Some(identity);
    }

    let refreshed = match refresh_token(validator.connection(), identity.claims(), policy).await {
        Ok(refreshed) => refreshed,
        Err(e) => {
            error!(error = %e, subject = %identity.uid(), "Token refresh failed");
            return Some(identity);
        }
    };

    match validator.validate(&refreshed.token, format).await {
        Ok(validated) => {
            info!(subject = %validated.claims.sub, "Replaced aging token");
            Some(Identity {
                token: refreshed.token.clone(),
                location: identity.location,
                validated,
                refreshed: Some(refreshed),
            })
        }
        Err(e) => {
            error!(error = %e, subject = %identity.uid(), "Refreshed token failed validation");
            Some(identity)
        }
    }
}

fn log_rejection(error: &TrustError, location: TokenLocation) {
    if error.is_token_rejection() {
        info!(error = %error, ?location, "Rejected token");
    } else {
        error!(error = %error, ?location, "Could not validate token");
    }
}
