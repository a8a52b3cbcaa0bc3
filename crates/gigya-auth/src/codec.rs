//! Token codec
//!
//! Identity tokens are three dot-separated base64 segments. The issuer
//! encodes the signature segment with its own alphabet (`-` and `_` where
//! standard base64 has `+` and `/`), so a token straight off the wire has to
//! be reformatted before standard verification.
//!
//! Segment decoding is lenient: both alphabets are accepted, padded or not.
//! The verifier gets the signature re-encoded as URL-safe base64 without
//! padding; the header and payload text is never touched since the
//! signature covers it byte for byte.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Deserialize;
use serde_json::Value;

use crate::claims::IdentityClaims;
use crate::error::{TrustError, TrustResult};

/// Standard alphabet, padding optional
pub(crate) const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Wire format of a token handed to the validator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenFormat {
    /// Plain JWT
    #[default]
    Standard,
    /// Signature segment in the issuer's alphabet
    Issuer,
}

/// Issuer alphabet to standard alphabet
pub fn munge(s: &str) -> String {
    s.replace('-', "+").replace('_', "/")
}

/// Standard alphabet to issuer alphabet
pub fn unmunge(s: &str) -> String {
    s.replace('+', "-").replace('/', "_")
}

/// The three segments of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenParts<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

impl<'a> TokenParts<'a> {
    /// Split a token; the signature may be empty (unsigned tokens)
    ///
    /// # Errors
    ///
    /// [`TrustError::MalformedToken`] unless there are exactly three
    /// segments with non-empty header and payload.
    pub fn split(token: &'a str) -> TrustResult<Self> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TrustError::malformed("token must have exactly three segments"));
        };

        if header.is_empty() || payload.is_empty() {
            return Err(TrustError::malformed("token has an empty segment"));
        }

        Ok(Self {
            header,
            payload,
            signature,
        })
    }

    /// `header.payload`, the text the signature covers
    pub fn signable(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }
}

/// Munge the signature segment of a token
///
/// # Errors
///
/// [`TrustError::MalformedToken`] unless the token has exactly three
/// non-empty segments.
pub fn reformat(token: &str) -> TrustResult<String> {
    let parts = TokenParts::split(token)?;
    if parts.signature.is_empty() {
        return Err(TrustError::malformed("token has an empty segment"));
    }
    Ok(format!("{}.{}", parts.signable(), munge(parts.signature)))
}

/// Decode a segment written in either alphabet
///
/// # Errors
///
/// [`TrustError::MalformedToken`] if the segment is not base64.
pub fn decode_segment(segment: &str) -> TrustResult<Vec<u8>> {
    STANDARD_LENIENT
        .decode(munge(segment))
        .map_err(|e| TrustError::malformed(format!("invalid base64 segment: {e}")))
}

/// Header fields read before verification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm as named in the header
    pub alg: String,
    /// Key id; older tokens call it `keyid`
    #[serde(default, alias = "keyid")]
    pub kid: Option<String>,
    /// Token type
    #[serde(default)]
    pub typ: Option<String>,
}

/// A decoded but unverified token
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    pub header: TokenHeader,
    pub claims: IdentityClaims,
}

/// Decode header and claims without checking the signature
///
/// # Errors
///
/// [`TrustError::MalformedToken`] on any structural failure, including
/// claims missing `sub`, `apiKey`, `iat` or `exp`.
pub fn decode_unverified(token: &str) -> TrustResult<UnverifiedToken> {
    let parts = TokenParts::split(token.trim())?;

    let header: TokenHeader = serde_json::from_slice(&decode_segment(parts.header)?)
        .map_err(|e| TrustError::malformed(format!("invalid header: {e}")))?;
    let payload: Value = serde_json::from_slice(&decode_segment(parts.payload)?)
        .map_err(|e| TrustError::malformed(format!("invalid payload: {e}")))?;
    let claims: IdentityClaims = serde_json::from_value(payload)
        .map_err(|e| TrustError::malformed(format!("invalid claims: {e}")))?;

    Ok(UnverifiedToken { header, claims })
}

/// Token text in the form the standard verifier expects
///
/// Issuer-format tokens are reformatted first. The signature is re-encoded
/// as URL-safe base64 without padding.
///
/// # Errors
///
/// [`TrustError::MalformedToken`] for unsigned or structurally invalid
/// tokens.
pub fn verification_form(token: &str, format: TokenFormat) -> TrustResult<String> {
    let token = match format {
        TokenFormat::Issuer => reformat(token.trim())?,
        TokenFormat::Standard => token.trim().to_string(),
    };

    let parts = TokenParts::split(&token)?;
    if parts.signature.is_empty() {
        return Err(TrustError::malformed("token is not signed"));
    }
    let signature = decode_segment(parts.signature)?;

    Ok(format!(
        "{}.{}",
        parts.signable(),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}
