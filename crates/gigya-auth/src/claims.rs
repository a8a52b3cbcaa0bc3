//! Identity token claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim names owned by the issuer; everything else is a profile field
pub const RESERVED_CLAIMS: [&str; 5] = ["iss", "apiKey", "iat", "exp", "sub"];

/// Claims carried by an identity token
///
/// `sub`, `apiKey`, `iat` and `exp` are required. Profile fields the issuer
/// was asked to include (`firstName`, `email`, ...) land in `additional`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Account UID
    pub sub: String,

    /// API key of the site that issued the token
    #[serde(rename = "apiKey")]
    pub api_key: String,

    /// Issued at, seconds since the epoch
    pub iat: i64,

    /// Expiry, seconds since the epoch
    pub exp: i64,

    /// Issuer URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Profile fields
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl IdentityClaims {
    /// Issue time
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    /// Expiry time
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Whether `exp` lies before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }

    /// A profile field as a string
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.additional.get(name).and_then(Value::as_str)
    }

    /// `email`, if the token carries it
    pub fn email(&self) -> Option<&str> {
        self.field_str("email")
    }

    /// Names of the non-reserved claims, in token order
    pub fn profile_field_names(&self) -> Vec<&str> {
        self.additional
            .keys()
            .map(String::as_str)
            .filter(|name| !RESERVED_CLAIMS.contains(name))
            .collect()
    }

    /// The claims as a JSON object
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
