//! ECDH → HKDF → keystream, the way the two channel endpoints use them.

use securegen_crypto_core::encoding::{from_hex, to_hex};
use securegen_crypto_core::{
    apply_keystream, client_nonce, derive_session_key, unxor_hex, xor_hex, AgreementKeyPair,
};

#[test]
fn both_endpoints_derive_same_session_key() {
    let server = AgreementKeyPair::generate();
    let browser = AgreementKeyPair::generate();
    let nonce = client_nonce("abc123");

    let server_shared = server.shared_secret(browser.public_key()).unwrap();
    let browser_shared = browser.shared_secret(server.public_key()).unwrap();

    let server_key = derive_session_key(server_shared.expose(), &nonce);
    let browser_key = derive_session_key(browser_shared.expose(), &nonce);
    assert_eq!(server_key.expose(), browser_key.expose());
}

#[test]
fn public_key_hex_parses_back() {
    let server = AgreementKeyPair::generate();
    let browser = AgreementKeyPair::generate();
    let wire = from_hex(&browser.public_key_hex()).unwrap();
    assert!(server.shared_secret(&wire).is_ok());
}

#[test]
fn message_through_derived_key() {
    let server = AgreementKeyPair::generate();
    let browser = AgreementKeyPair::generate();
    let nonce = client_nonce("abc123");
    let key = derive_session_key(
        server.shared_secret(browser.public_key()).unwrap().expose(),
        &nonce,
    );

    let iv = [0x3cu8; 16];
    let mut data = b"ping".to_vec();
    apply_keystream(&mut data, key.expose(), &iv).unwrap();
    let wire = to_hex(&data);

    let mut back = from_hex(&wire).unwrap();
    apply_keystream(&mut back, key.expose(), &iv).unwrap();
    assert_eq!(back, b"ping");
}

#[test]
fn session_key_hex_survives_static_obfuscation() {
    let server = AgreementKeyPair::generate();
    let browser = AgreementKeyPair::generate();
    let key = derive_session_key(
        server.shared_secret(browser.public_key()).unwrap().expose(),
        &client_nonce("c1"),
    );
    let key_hex = to_hex(key.expose());
    let hidden = xor_hex(&key_hex, "SecureStaticKey2024!").unwrap();
    assert_ne!(hidden, key_hex);
    assert_eq!(unxor_hex(&hidden, "SecureStaticKey2024!").unwrap(), key_hex);
}
