//! Verification keys built from the issuer's key descriptors

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::codec::{STANDARD_LENIENT, munge};
use crate::error::{TrustError, TrustResult};

/// Public key descriptor as returned by `accounts.getJWTPublicKey`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    /// Key id
    pub kid: String,
    /// Key type, `RSA` expected
    pub kty: String,
    /// Modulus, issuer alphabet
    pub n: String,
    /// Exponent, standard alphabet
    pub e: String,
    /// Signing algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Key use
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

/// An RSA public key ready for signature verification
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    decoding_key: DecodingKey,
    modulus_bits: usize,
}

// DecodingKey has no useful Debug output
impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("modulus_bits", &self.modulus_bits)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Build a key from a fetched descriptor
    ///
    /// # Errors
    ///
    /// [`TrustError::UnsupportedKeyType`] unless `kty` is `RSA`, otherwise
    /// whatever [`build_rsa_key`] reports.
    pub fn from_descriptor(descriptor: &KeyDescriptor) -> TrustResult<Self> {
        if descriptor.kty != "RSA" {
            return Err(TrustError::UnsupportedKeyType(descriptor.kty.clone()));
        }
        build_rsa_key(&descriptor.kid, &descriptor.n, &descriptor.e)
    }

    /// Key id
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Size of the modulus in bits
    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    /// The key in the form jsonwebtoken verifies with
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Build an RSA verification key from the issuer's encoded components
///
/// The modulus is munged before decoding since the issuer writes it in its
/// own alphabet. The exponent is decoded as is. Key strength is not checked
/// here.
///
/// # Errors
///
/// [`TrustError::KeyConstruction`] if either component is not base64 or the
/// pair does not form an RSA public key.
pub fn build_rsa_key(kid: &str, modulus: &str, exponent: &str) -> TrustResult<VerificationKey> {
    let n = STANDARD_LENIENT
        .decode(munge(modulus))
        .map_err(|e| TrustError::key_construction(format!("modulus is not base64: {e}")))?;
    let e = STANDARD_LENIENT
        .decode(exponent)
        .map_err(|e| TrustError::key_construction(format!("exponent is not base64: {e}")))?;

    let public_key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
        .map_err(|e| TrustError::key_construction(format!("invalid RSA key: {e}")))?;
    let modulus_bits = public_key.n().bits();

    let decoding_key =
        DecodingKey::from_rsa_components(&URL_SAFE_NO_PAD.encode(&n), &URL_SAFE_NO_PAD.encode(&e))
            .map_err(|e| TrustError::key_construction(e.to_string()))?;

    Ok(VerificationKey {
        kid: kid.to_string(),
        decoding_key,
        modulus_bits,
    })
}
