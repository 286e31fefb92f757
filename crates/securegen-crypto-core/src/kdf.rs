//! PBKDF2-HMAC-SHA256 key derivation and password hash records.
//!
//! This module provides:
//! - [`derive`]: derive a 256-bit key from a password and salt
//! - [`hash_password`] / [`verify_password`]: salted login hashes
//! - [`PasswordHash`]: the `"<hex salt>:<hex key>"` record kept in flash
//!
//! # Iteration tiers
//!
//! - **Login hashes** use [`DEFAULT_LOGIN_ITERATIONS`]
//! - **Password-wrapped exports** use the higher [`DEFAULT_EXPORT_ITERATIONS`]
//!
//! Both are tuned for a 240 MHz microcontroller and can be lowered through
//! configuration for tests. Every derivation feeds the watchdog before and
//! after the PBKDF2 loop.

use crate::encoding::{from_hex, to_hex};
use crate::error::CryptoError;
use crate::memory::{constant_time_eq, SecretBytes};
use crate::watchdog::{guarded, Watchdog};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Output length of the KDF in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Salt length for freshly generated hashes and bundles.
pub const SALT_LEN: usize = 16;

/// Iteration count for login password hashes.
pub const DEFAULT_LOGIN_ITERATIONS: u32 = 10_000;

/// Iteration count for password-wrapped export bundles.
pub const DEFAULT_EXPORT_ITERATIONS: u32 = 15_000;

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive a 32-byte key with PBKDF2-HMAC-SHA256.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if `iterations` is zero or the salt
/// is empty.
pub fn derive(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    watchdog: &dyn Watchdog,
) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be non-zero".into(),
        ));
    }
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("salt must not be empty".into()));
    }

    let mut out = [0u8; KEY_LEN];
    guarded(watchdog, || {
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    });
    let key = SecretBytes::new(out);
    out.zeroize();
    Ok(key)
}

// ---------------------------------------------------------------------------
// Password hash record
// ---------------------------------------------------------------------------

/// Salted PBKDF2 hash as stored in flash: `"<hex salt>:<hex key>"`.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    salt: Vec<u8>,
    key: [u8; KEY_LEN],
}

impl PasswordHash {
    /// Salt bytes.
    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Derived key bytes.
    #[must_use]
    pub const fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", to_hex(&self.salt), to_hex(&self.key))
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordHash(salt={}, key=***)", to_hex(&self.salt))
    }
}

impl FromStr for PasswordHash {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (salt_hex, key_hex) = s.split_once(':').ok_or_else(|| {
            CryptoError::MalformedEnvelope("password hash has no ':' separator".into())
        })?;
        let salt = from_hex(salt_hex)?;
        if salt.is_empty() {
            return Err(CryptoError::MalformedEnvelope(
                "password hash salt is empty".into(),
            ));
        }
        let key_bytes = from_hex(key_hex)?;
        let key: [u8; KEY_LEN] = key_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedEnvelope(format!(
                "password hash key is {} bytes (expected {KEY_LEN})",
                key_bytes.len()
            ))
        })?;
        Ok(Self { salt, key })
    }
}

impl Drop for PasswordHash {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Hash a password with a fresh random 16-byte salt.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if `iterations` is zero.
pub fn hash_password(
    password: &str,
    iterations: u32,
    watchdog: &dyn Watchdog,
) -> Result<PasswordHash, CryptoError> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive(password.as_bytes(), &salt, iterations, watchdog)?;
    Ok(PasswordHash {
        salt,
        key: *key.expose(),
    })
}

/// Check `password` against a stored `"<hex salt>:<hex key>"` record.
///
/// A malformed record never matches.
#[must_use]
pub fn verify_password(
    password: &str,
    stored: &str,
    iterations: u32,
    watchdog: &dyn Watchdog,
) -> bool {
    let Ok(record) = stored.parse::<PasswordHash>() else {
        return false;
    };
    let Ok(candidate) = derive(password.as_bytes(), &record.salt, iterations, watchdog) else {
        return false;
    };
    constant_time_eq(candidate.expose(), &record.key)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchdog::{CountingWatchdog, NoopWatchdog};

    const FAST: u32 = 2;

    #[test]
    fn derive_rejects_zero_iterations() {
        let err = derive(b"pw", b"salt", 0, &NoopWatchdog).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn derive_rejects_empty_salt() {
        let err = derive(b"pw", b"", 1, &NoopWatchdog).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive(b"pw", b"0123456789abcdef", FAST, &NoopWatchdog).unwrap();
        let b = derive(b"pw", b"0123456789abcdef", FAST, &NoopWatchdog).unwrap();
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn hash_record_format() {
        let hash = hash_password("hunter2", FAST, &NoopWatchdog).unwrap();
        let text = hash.to_string();
        let (salt, key) = text.split_once(':').unwrap();
        assert_eq!(salt.len(), 32);
        assert_eq!(key.len(), 64);
        assert!(text.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn verify_accepts_correct_and_rejects_wrong_password() {
        let stored = hash_password("hunter2", FAST, &NoopWatchdog).unwrap().to_string();
        assert!(verify_password("hunter2", &stored, FAST, &NoopWatchdog));
        assert!(!verify_password("hunter3", &stored, FAST, &NoopWatchdog));
    }

    #[test]
    fn verify_with_other_iteration_count_fails() {
        let stored = hash_password("hunter2", FAST, &NoopWatchdog).unwrap().to_string();
        assert!(!verify_password("hunter2", &stored, FAST + 1, &NoopWatchdog));
    }

    #[test]
    fn verify_rejects_malformed_records() {
        for stored in ["", "nocolon", ":", "zz:00", "00:0011", "00112233"] {
            assert!(!verify_password("x", stored, FAST, &NoopWatchdog), "{stored}");
        }
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("same", FAST, &NoopWatchdog).unwrap();
        let b = hash_password("same", FAST, &NoopWatchdog).unwrap();
        assert_ne!(a.salt(), b.salt());
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn hashing_feeds_watchdog_around_pbkdf2() {
        let dog = CountingWatchdog::default();
        let stored = hash_password("hunter2", FAST, &dog).unwrap().to_string();
        assert!(dog.feeds() >= 2, "hash fed {} times", dog.feeds());

        let before = dog.feeds();
        assert!(verify_password("hunter2", &stored, FAST, &dog));
        assert!(dog.feeds() >= before + 2, "verify fed {} times", dog.feeds() - before);
    }

    #[test]
    fn derive_feeds_before_and_after() {
        let dog = CountingWatchdog::default();
        derive(b"pw", b"0123456789abcdef", FAST, &dog).unwrap();
        assert_eq!(dog.feeds(), 2);
    }

    #[test]
    fn debug_hides_key() {
        let hash = hash_password("pw", FAST, &NoopWatchdog).unwrap();
        let debug = format!("{hash:?}");
        assert!(debug.contains("key=***"));
        assert!(!debug.contains(&to_hex(hash.key())));
    }
}
