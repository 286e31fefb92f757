//! Session-key derivation equals standard HKDF-SHA256.
//!
//! `derive_session_key` writes the Extract and Expand passes out by hand;
//! these tests pin it to `ring::hkdf` with the same salt and info.

use ring::hkdf;
use securegen_crypto_core::hkdf::{client_nonce, derive_session_key, SESSION_INFO};

/// Marker type for 32-byte HKDF output.
struct HkdfLen32;

impl hkdf::KeyType for HkdfLen32 {
    fn len(&self) -> usize {
        32
    }
}

fn ring_hkdf(ikm: &[u8], salt: &[u8], info: &[u8]) -> [u8; 32] {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, salt).extract(ikm);
    let info_refs: &[&[u8]] = &[info];
    let okm = prk
        .expand(info_refs, HkdfLen32)
        .expect("HKDF expand should succeed");
    let mut out = [0u8; 32];
    okm.fill(&mut out).expect("HKDF fill should succeed");
    out
}

#[test]
fn matches_ring_for_short_client_id() {
    let shared = [0x4au8; 32];
    let nonce = client_nonce("abc123");
    let ours = derive_session_key(&shared, &nonce);
    assert_eq!(ours.expose(), &ring_hkdf(&shared, &nonce, SESSION_INFO));
}

#[test]
fn matches_ring_across_inputs() {
    for (i, id) in ["", "a", "0123456789abcdef", "0123456789abcdef-long-tail"]
        .iter()
        .enumerate()
    {
        let shared: Vec<u8> = (0..32u8).map(|b| b.wrapping_mul(7).wrapping_add(i as u8)).collect();
        let nonce = client_nonce(id);
        let ours = derive_session_key(&shared, &nonce);
        assert_eq!(ours.expose(), &ring_hkdf(&shared, &nonce, SESSION_INFO), "id={id}");
    }
}

#[test]
fn info_string_is_bound() {
    let shared = [0x01u8; 32];
    let nonce = client_nonce("client");
    let ours = derive_session_key(&shared, &nonce);
    assert_ne!(ours.expose(), &ring_hkdf(&shared, &nonce, b"SecureLayerV2"));
}
