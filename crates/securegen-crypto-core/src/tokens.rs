//! Random identifiers: login session ids, CSRF tokens, client ids, PINs.

use crate::encoding::to_hex;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use ring::digest;
use std::ops::RangeInclusive;

/// Random bytes in a login session id (128 bits).
pub const SESSION_ID_BYTES: usize = 16;

/// Random bytes in a CSRF token (256 bits).
pub const CSRF_TOKEN_BYTES: usize = 32;

/// Digest bytes kept for a derived client id.
pub const CLIENT_ID_BYTES: usize = 16;

/// Six-digit PIN range used for BLE pairing.
pub const PIN_RANGE: RangeInclusive<u32> = 100_000..=999_999;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// 32 lowercase hex characters.
#[must_use]
pub fn generate_session_id() -> String {
    random_hex(SESSION_ID_BYTES)
}

/// 64 lowercase hex characters.
#[must_use]
pub fn generate_csrf_token() -> String {
    random_hex(CSRF_TOKEN_BYTES)
}

/// Stable client id: first 16 bytes of SHA-256 over `fingerprint`, in hex.
#[must_use]
pub fn generate_client_id(fingerprint: &[u8]) -> String {
    let hash = digest::digest(&digest::SHA256, fingerprint);
    to_hex(&hash.as_ref()[..CLIENT_ID_BYTES])
}

/// Uniform PIN in `range`. An empty range yields its start.
#[must_use]
pub fn generate_pin(range: RangeInclusive<u32>) -> u32 {
    if range.is_empty() {
        return *range.start();
    }
    OsRng.gen_range(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lengths() {
        assert_eq!(generate_session_id().len(), 32);
        assert_eq!(generate_csrf_token().len(), 64);
        assert!(generate_csrf_token().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_session_id(), generate_session_id());
        assert_ne!(generate_csrf_token(), generate_csrf_token());
    }

    #[test]
    fn client_id_is_stable() {
        let a = generate_client_id(b"browser fingerprint");
        assert_eq!(a.len(), 32);
        assert_eq!(a, generate_client_id(b"browser fingerprint"));
        assert_ne!(a, generate_client_id(b"another browser"));
    }

    #[test]
    fn pins_stay_in_range() {
        for _ in 0..200 {
            assert!(PIN_RANGE.contains(&generate_pin(PIN_RANGE)));
        }
        assert_eq!(generate_pin(5..=5), 5);
    }
}
