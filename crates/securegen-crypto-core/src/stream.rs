//! Per-message XOR stream and hex obfuscation for the secure channel.
//!
//! `out[i] = in[i] ^ key[i % key.len()] ^ iv[i % iv.len()]`. This is the
//! browser-compatible message format; it provides confidentiality only
//! against observers without the session key and no integrity at all.
//! Replay protection comes from the envelope counter, not from here.

use crate::encoding::{from_hex, to_hex};
use crate::error::CryptoError;

/// Apply the keystream in place. Symmetric: applying twice restores the input.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` if the key or IV is empty.
pub fn apply_keystream(data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), CryptoError> {
    if key.is_empty() || iv.is_empty() {
        return Err(CryptoError::InvalidKeyMaterial(
            "keystream key and iv must be non-empty".into(),
        ));
    }
    for ((byte, k), v) in data.iter_mut().zip(key.iter().cycle()).zip(iv.iter().cycle()) {
        *byte ^= k ^ v;
    }
    Ok(())
}

/// XOR the UTF-8 bytes of `text` with a repeating `key` string and hex the result.
///
/// Used to hand the session key to browsers in the unprotected handshake.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` if `key` is empty.
pub fn xor_hex(text: &str, key: &str) -> Result<String, CryptoError> {
    let key = key.as_bytes();
    if key.is_empty() {
        return Err(CryptoError::InvalidKeyMaterial("xor key must be non-empty".into()));
    }
    let mixed: Vec<u8> = text
        .as_bytes()
        .iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect();
    Ok(to_hex(&mixed))
}

/// Inverse of [`xor_hex`].
///
/// # Errors
///
/// Returns `CryptoError::Encoding` on bad hex or non-UTF-8 output and
/// `CryptoError::InvalidKeyMaterial` if `key` is empty.
pub fn unxor_hex(hex: &str, key: &str) -> Result<String, CryptoError> {
    let key = key.as_bytes();
    if key.is_empty() {
        return Err(CryptoError::InvalidKeyMaterial("xor key must be non-empty".into()));
    }
    let mut bytes = from_hex(hex)?;
    for (b, k) in bytes.iter_mut().zip(key.iter().cycle()) {
        *b ^= k;
    }
    String::from_utf8(bytes).map_err(|_| CryptoError::Encoding("xor output is not UTF-8".into()))
}
