//! Password-wrapped bundles: `{"salt","iv","ciphertext"}`, all base64.
//!
//! Used for exports/imports and for the protected handshake, where the
//! "password" is the device static key. The key is PBKDF2-HMAC-SHA256 over
//! the password and a fresh 16-byte salt; the cipher is AES-256-CBC with
//! PKCS#7 and a fresh 16-byte IV.

use crate::encoding::{from_base64, to_base64};
use crate::error::CryptoError;
use crate::kdf::{derive, SALT_LEN};
use crate::memory::SecretBuffer;
use crate::symmetric::{decrypt_with_iv, encrypt_with_iv, IV_LEN};
use crate::watchdog::Watchdog;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// A password-wrapped ciphertext as it travels on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordBundle {
    /// Base64 PBKDF2 salt (16 bytes when produced here).
    pub salt: String,
    /// Base64 CBC IV (16 bytes).
    pub iv: String,
    /// Base64 PKCS#7-padded ciphertext.
    pub ciphertext: String,
}

impl PasswordBundle {
    /// Encrypt `plaintext` under a key derived from `password`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` if `iterations` is zero.
    pub fn seal(
        plaintext: &[u8],
        password: &str,
        iterations: u32,
        watchdog: &dyn Watchdog,
    ) -> Result<Self, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let key = derive(password.as_bytes(), &salt, iterations, watchdog)?;
        let ciphertext = encrypt_with_iv(plaintext, key.expose(), &iv)?;

        Ok(Self {
            salt: to_base64(&salt),
            iv: to_base64(&iv),
            ciphertext: to_base64(&ciphertext),
        })
    }

    /// Decrypt the bundle with `password`.
    ///
    /// A wrong password surfaces as a padding error (or, rarely, as garbage
    /// that the caller's own parsing rejects).
    ///
    /// # Errors
    ///
    /// - `CryptoError::MalformedEnvelope` on bad base64 or wrong field sizes
    /// - `CryptoError::DecryptionFailed`, `InvalidPadding` or
    ///   `PaddingVerificationFailed` from the cipher
    pub fn open(
        &self,
        password: &str,
        iterations: u32,
        watchdog: &dyn Watchdog,
    ) -> Result<SecretBuffer, CryptoError> {
        let salt = decode_field("salt", &self.salt)?;
        let iv = decode_field("iv", &self.iv)?;
        let ciphertext = decode_field("ciphertext", &self.ciphertext)?;

        if salt.is_empty() {
            return Err(CryptoError::MalformedEnvelope("salt is empty".into()));
        }
        if iv.len() != IV_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "iv is {} bytes (expected {IV_LEN})",
                iv.len()
            )));
        }

        let key = derive(password.as_bytes(), &salt, iterations, watchdog)?;
        decrypt_with_iv(&ciphertext, key.expose(), &iv)
    }

    /// Serialize to the compact JSON object sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encoding` if serialization fails.
    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    /// Parse a bundle, rejecting missing fields.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedEnvelope` if the JSON is invalid or a
    /// field is missing or not a string.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    from_base64(value)
        .map_err(|_| CryptoError::MalformedEnvelope(format!("field '{name}' is not base64")))
}

/// Encrypt `plaintext` with `password`, returning the bundle JSON.
///
/// # Errors
///
/// See [`PasswordBundle::seal`].
pub fn encrypt_with_password(
    plaintext: &[u8],
    password: &str,
    iterations: u32,
    watchdog: &dyn Watchdog,
) -> Result<String, CryptoError> {
    PasswordBundle::seal(plaintext, password, iterations, watchdog)?.to_json()
}

/// Decrypt bundle JSON produced by [`encrypt_with_password`].
///
/// # Errors
///
/// See [`PasswordBundle::from_json`] and [`PasswordBundle::open`].
pub fn decrypt_with_password(
    bundle_json: &str,
    password: &str,
    iterations: u32,
    watchdog: &dyn Watchdog,
) -> Result<SecretBuffer, CryptoError> {
    PasswordBundle::from_json(bundle_json)?.open(password, iterations, watchdog)
}
