//! Signed-token codec: JSON payloads rendered as URL-safe base64 and
//! authenticated with HMAC-SHA-256.
//!
//! A sealed token has the form `payload_b64.signature_b64`. The signature
//! is computed over the *encoded* payload segment, so verification never
//! has to parse untrusted bytes before the MAC check passes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::TokenError;

type HmacSha256 = Hmac<Sha256>;

/// Serialize a payload to JSON and render it as URL-safe base64
/// (no padding).
pub fn encode<T: Serialize>(payload: &T) -> String {
    let bytes = serde_json::to_vec(payload).expect("payload serialization");
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Reverse of [`encode`]. Fails on invalid base64 or when the decoded
/// bytes are not JSON of the expected shape (unknown fields included).
pub fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .map_err(|_| TokenError::Decode)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Decode)
}

/// HMAC-SHA-256 of `data` under `secret`, rendered URL-safe base64.
/// Deterministic: the same inputs always produce the same signature.
pub fn sign(secret: &[u8], data: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(data.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Encode and sign a payload into a `payload_b64.signature_b64` token.
pub fn seal<T: Serialize>(secret: &[u8], payload: &T) -> String {
    let payload_b64 = encode(payload);
    let signature = sign(secret, &payload_b64);
    format!("{payload_b64}.{signature}")
}

/// Verify a sealed token and decode its payload.
///
/// The signature comparison is constant-time; a mismatch is reported the
/// same way whether the token was tampered with or signed under a
/// different secret.
pub fn open<T: DeserializeOwned>(secret: &[u8], token: &str) -> Result<T, TokenError> {
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
    if payload_b64.is_empty() || signature_b64.is_empty() {
        return Err(TokenError::Malformed);
    }

    let supplied = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::BadSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload_b64.as_bytes());
    let expected = mac.finalize().into_bytes();

    // Length is not secret; the byte comparison must not short-circuit.
    if supplied.len() != expected.len() || expected.ct_eq(&supplied).unwrap_u8() != 1 {
        return Err(TokenError::BadSignature);
    }

    decode(payload_b64)
}
