//! NIST SP 800-38A F.2.5: CBC-AES256.Encrypt.
//!
//! Our encryptor always appends PKCS#7 padding, so the 64-byte vector is a
//! prefix of the output followed by one full padding block.

use securegen_crypto_core::encoding::from_hex;
use securegen_crypto_core::CryptoError;
use securegen_crypto_core::symmetric::{decrypt_with_iv, encrypt_with_iv, BLOCK_LEN};

const KEY: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";
const IV: &str = "000102030405060708090a0b0c0d0e0f";
const PLAINTEXT: &str = "6bc1bee22e409f96e93d7e117393172a\
                         ae2d8a571e03ac9c9eb76fac45af8e51\
                         30c81c46a35ce411e5fbc1191a0a52ef\
                         f69f2445df4f9b17ad2b417be66c3710";
const CIPHERTEXT: &str = "f58c4c04d6e5f1ba779eabfb5f7bfbd6\
                          9cfc4e967edb808d679f777bc6702c7d\
                          39f23369a9d9bacfa530e26304231461\
                          b2eb05e2c39be9fcda6c19078c6a9d1b";

#[test]
fn nist_f25_blocks_match() {
    let key = from_hex(KEY).unwrap();
    let iv = from_hex(IV).unwrap();
    let pt = from_hex(PLAINTEXT).unwrap();
    let expected = from_hex(CIPHERTEXT).unwrap();

    let ct = encrypt_with_iv(&pt, &key, &iv).expect("encrypt should succeed");
    assert_eq!(ct.len(), expected.len() + BLOCK_LEN);
    assert_eq!(&ct[..expected.len()], expected.as_slice());
}

#[test]
fn nist_f25_decrypts_back() {
    let key = from_hex(KEY).unwrap();
    let iv = from_hex(IV).unwrap();
    let pt = from_hex(PLAINTEXT).unwrap();

    let ct = encrypt_with_iv(&pt, &key, &iv).unwrap();
    let opened = decrypt_with_iv(&ct, &key, &iv).expect("decrypt should succeed");
    assert_eq!(opened.expose(), pt.as_slice());
}

/// The last NIST plaintext block ends in 0x10, a legal pad length, but the
/// bytes before it are not 0x10.
#[test]
fn vector_without_padding_block_fails_verification() {
    let key = from_hex(KEY).unwrap();
    let iv = from_hex(IV).unwrap();
    let ct = from_hex(CIPHERTEXT).unwrap();
    assert!(matches!(
        decrypt_with_iv(&ct, &key, &iv),
        Err(CryptoError::PaddingVerificationFailed)
    ));
}
