//! HKDF-SHA256 session key derivation (RFC 5869, single output block).
//!
//! The two HMAC passes are written out with `ring::hmac` so the exact bytes
//! hashed are visible: Extract with the client nonce as salt, then Expand with
//! `"SecureLayerV1" || 0x01`. For a 32-byte output this is identical to
//! standard HKDF-SHA256.

use crate::memory::SecretBytes;
use ring::hmac;
use zeroize::Zeroize;

/// HKDF info string bound into every session key.
pub const SESSION_INFO: &[u8] = b"SecureLayerV1";

/// Client nonce length, taken from the client id.
pub const CLIENT_NONCE_LEN: usize = 16;

/// Derived session key length.
pub const SESSION_KEY_LEN: usize = 32;

/// First 16 bytes of the client id, zero-padded when shorter.
#[must_use]
pub fn client_nonce(client_id: &str) -> [u8; CLIENT_NONCE_LEN] {
    let mut nonce = [0u8; CLIENT_NONCE_LEN];
    let id = client_id.as_bytes();
    let n = id.len().min(CLIENT_NONCE_LEN);
    nonce[..n].copy_from_slice(&id[..n]);
    nonce
}

/// Derive the 32-byte session key from an ECDH shared secret.
#[must_use]
pub fn derive_session_key(
    shared_secret: &[u8],
    nonce: &[u8; CLIENT_NONCE_LEN],
) -> SecretBytes<SESSION_KEY_LEN> {
    // Extract
    let salt_key = hmac::Key::new(hmac::HMAC_SHA256, nonce);
    let prk_tag = hmac::sign(&salt_key, shared_secret);
    let mut prk = [0u8; SESSION_KEY_LEN];
    prk.copy_from_slice(prk_tag.as_ref());

    // Expand, T(1) only
    let prk_key = hmac::Key::new(hmac::HMAC_SHA256, &prk);
    let mut ctx = hmac::Context::with_key(&prk_key);
    ctx.update(SESSION_INFO);
    ctx.update(&[0x01]);
    let okm_tag = ctx.sign();

    let mut okm = [0u8; SESSION_KEY_LEN];
    okm.copy_from_slice(okm_tag.as_ref());
    let key = SecretBytes::new(okm);
    prk.zeroize();
    okm.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_pads_short_ids() {
        let nonce = client_nonce("abc123");
        assert_eq!(&nonce[..6], b"abc123");
        assert!(nonce[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn nonce_truncates_long_ids() {
        let nonce = client_nonce("0123456789abcdefXYZ");
        assert_eq!(&nonce, b"0123456789abcdef");
    }

    #[test]
    fn empty_id_gives_zero_nonce() {
        assert_eq!(client_nonce(""), [0u8; CLIENT_NONCE_LEN]);
    }

    #[test]
    fn deterministic_and_nonce_sensitive() {
        let shared = [0x11u8; 32];
        let a = derive_session_key(&shared, &client_nonce("alice"));
        let b = derive_session_key(&shared, &client_nonce("alice"));
        let c = derive_session_key(&shared, &client_nonce("bob"));
        assert_eq!(a.expose(), b.expose());
        assert_ne!(a.expose(), c.expose());
    }
}
