//! Hex and base64 codecs used on the wire and in flash records.
//!
//! Hex output is always lowercase; hex input accepts either case.
//! Base64 is the standard alphabet with padding.

use crate::error::CryptoError;
use data_encoding::{BASE64, HEXLOWER, HEXLOWER_PERMISSIVE};

/// Lowercase hex encoding.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    HEXLOWER.encode(bytes)
}

/// Decode hex in either case.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` on odd length or non-hex characters.
pub fn from_hex(text: &str) -> Result<Vec<u8>, CryptoError> {
    HEXLOWER_PERMISSIVE
        .decode(text.as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("invalid hex: {e}")))
}

/// Standard base64 with padding.
#[must_use]
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard padded base64.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` on invalid characters or bad padding.
pub fn from_base64(text: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(text.as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}
