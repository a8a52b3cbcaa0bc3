//! Error types for gigya-client
//!
//! Remote failures are only raised when a call opts into strict mode. In the
//! default mode they are encoded in the returned [`ApiResponse`] instead, so
//! most variants here come from strict calls, proxy misuse or configuration.

use thiserror::Error;

use crate::response::ApiResponse;

/// Result type for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Main error type for gigya-client
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    /// The remote API reported an error (strict mode only)
    ///
    /// Carries the full response envelope so callers can inspect the
    /// `errorCode`, `statusCode` and any payload fields.
    #[error("Remote API error: {message}")]
    RemoteApi {
        message: String,
        response: Box<ApiResponse>,
    },

    /// The remote API could not be reached or answered with something that is
    /// not a JSON object (strict mode only)
    ///
    /// `response` is the synthesized failure envelope that a non-strict call
    /// would have returned.
    #[error("Transport error: {detail}")]
    Transport {
        detail: String,
        response: Box<ApiResponse>,
    },

    /// A proxy operation needs an area but none is bound
    #[error("Proxy has no area bound, cannot run {operation}")]
    UnboundProxy { operation: String },

    /// The proxy cannot perform the requested operation in its current state
    #[error("Unsupported proxy operation: {0}")]
    UnsupportedOperation(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
    },

    /// One of the account registration steps failed
    #[error("Registration failed: {0}")]
    Registration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Create a remote API error from an error envelope
    pub fn remote_api(response: ApiResponse) -> Self {
        let message = format!(
            "{}: {}",
            response.error_message().unwrap_or_default(),
            response.error_details().unwrap_or_default()
        );
        Self::RemoteApi {
            message,
            response: Box::new(response),
        }
    }

    /// Create a remote API error for a success envelope missing expected fields
    pub fn unexpected_response(message: impl Into<String>, response: ApiResponse) -> Self {
        Self::RemoteApi {
            message: message.into(),
            response: Box::new(response),
        }
    }

    /// Create a transport error from a synthesized failure envelope
    pub fn transport(detail: impl Into<String>, response: ApiResponse) -> Self {
        Self::Transport {
            detail: detail.into(),
            response: Box::new(response),
        }
    }

    /// Create an unbound proxy error
    pub fn unbound_proxy(operation: impl Into<String>) -> Self {
        Self::UnboundProxy {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: None,
        }
    }

    /// Create a configuration error naming the offending key
    pub fn configuration_with_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// The response envelope attached to this error, if any
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Self::RemoteApi { response, .. } | Self::Transport { response, .. } => Some(response),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_api_message_uses_error_fields() {
        let response = ApiResponse::from_value(json!({
            "errorCode": 403042,
            "errorMessage": "Invalid LoginID",
            "errorDetails": "invalid loginID or password",
        }));

        let err = ClientError::remote_api(response);
        assert_eq!(
            err.to_string(),
            "Remote API error: Invalid LoginID: invalid loginID or password"
        );
        assert_eq!(err.response().map(ApiResponse::error_code), Some(403042));
    }

    #[test]
    fn test_configuration_with_key() {
        let err = ClientError::configuration_with_key("missing", "GIGYA_API_KEY");
        match err {
            ClientError::Configuration { key, .. } => {
                assert_eq!(key.as_deref(), Some("GIGYA_API_KEY"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
