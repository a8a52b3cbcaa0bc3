//! Response envelope returned by every remote call
//!
//! The remote API always answers with a JSON object. Success and failure are
//! told apart by the integer `errorCode` field (0 means success) and the
//! HTTP-style `statusCode` field. Transport failures never reach the caller as
//! errors in non-strict mode; they are turned into a synthesized envelope
//! carrying [`TRANSPORT_FAILURE_CODE`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error code used for synthesized transport failure envelopes
pub const TRANSPORT_FAILURE_CODE: i64 = 600;

const TRANSPORT_FAILURE_MESSAGE: &str = "Unknown error";
const TRANSPORT_FAILURE_DETAIL: &str = "Unable to communicate with authentication server";

/// Field carrying the raw transport diagnostics in a failure envelope
const TRANSPORT_DETAIL_FIELD: &str = "http";

/// A parsed remote API response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiResponse {
    body: Map<String, Value>,
}

impl ApiResponse {
    /// Wrap a JSON object body
    pub fn new(body: Map<String, Value>) -> Self {
        Self { body }
    }

    /// Wrap an arbitrary JSON value; non-objects become an empty envelope
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(body) => Self { body },
            _ => Self::default(),
        }
    }

    /// Parse a raw response body
    ///
    /// Returns `None` when the body is not a JSON object.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(body)) => Some(Self { body }),
            _ => None,
        }
    }

    /// Synthesize the fixed-shape envelope used for transport failures
    pub fn transport_failure(detail: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("errorCode".into(), Value::from(TRANSPORT_FAILURE_CODE));
        body.insert("errorMessage".into(), Value::from(TRANSPORT_FAILURE_MESSAGE));
        body.insert("errorDetail".into(), Value::from(TRANSPORT_FAILURE_DETAIL));
        body.insert(TRANSPORT_DETAIL_FIELD.into(), Value::from(detail.into()));
        Self { body }
    }

    /// Domain error code (`errorCode`), 0 when absent
    pub fn error_code(&self) -> i64 {
        self.body.get("errorCode").map(lenient_int).unwrap_or(0)
    }

    /// HTTP-style status (`statusCode`), 0 when absent
    pub fn status_code(&self) -> i64 {
        self.body.get("statusCode").map(lenient_int).unwrap_or(0)
    }

    /// Human readable error message
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("errorMessage").and_then(Value::as_str)
    }

    /// Error details; the API uses both `errorDetails` and `errorDetail`
    pub fn error_details(&self) -> Option<&str> {
        self.body
            .get("errorDetails")
            .or_else(|| self.body.get("errorDetail"))
            .and_then(Value::as_str)
    }

    /// Whether the envelope reports an error
    pub fn is_error(&self) -> bool {
        self.status_code() >= 400 || self.error_code() != 0
    }

    /// Whether this envelope was synthesized for a transport failure
    pub fn is_transport_failure(&self) -> bool {
        self.error_code() == TRANSPORT_FAILURE_CODE && self.body.contains_key(TRANSPORT_DETAIL_FIELD)
    }

    /// Raw transport diagnostics of a synthesized failure envelope
    pub fn transport_detail(&self) -> Option<&str> {
        self.body.get(TRANSPORT_DETAIL_FIELD).and_then(Value::as_str)
    }

    /// Look up a top-level payload field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Look up a top-level string field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Borrow the whole body
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Consume into the body map
    pub fn into_map(self) -> Map<String, Value> {
        self.body
    }

    /// Consume into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

impl From<Map<String, Value>> for ApiResponse {
    fn from(body: Map<String, Value>) -> Self {
        Self::new(body)
    }
}

/// Integer coercion matching the API's habit of sending codes as strings
///
/// Numeric strings out of `i64` range saturate, so they never read as 0.
fn lenient_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let trimmed = s.trim();
            let end = trimmed
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
                .map_or(trimmed.len(), |(i, _)| i);
            let digits = &trimmed[..end];
            match digits.parse::<i64>() {
                Ok(code) => code,
                Err(_) if !digits.bytes().any(|b| b.is_ascii_digit()) => 0,
                Err(_) if digits.starts_with('-') => i64::MIN,
                Err(_) => i64::MAX,
            }
        }
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => 0,
    }
}
