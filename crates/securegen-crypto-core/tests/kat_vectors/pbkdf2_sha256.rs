//! PBKDF2-HMAC-SHA256 vectors (P = "password", S = "salt", dkLen = 32).

use securegen_crypto_core::encoding::{from_hex, to_hex};
use securegen_crypto_core::kdf::{derive, verify_password, PasswordHash};
use securegen_crypto_core::NoopWatchdog;

const ONE_ITERATION: &str = "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b";
const TWO_ITERATIONS: &str = "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43";
const FOUR_K_ITERATIONS: &str = "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a";

#[test]
fn pbkdf2_sha256_c1() {
    let key = derive(b"password", b"salt", 1, &NoopWatchdog).unwrap();
    assert_eq!(to_hex(key.expose()), ONE_ITERATION);
}

#[test]
fn pbkdf2_sha256_c2() {
    let key = derive(b"password", b"salt", 2, &NoopWatchdog).unwrap();
    assert_eq!(to_hex(key.expose()), TWO_ITERATIONS);
}

#[test]
fn pbkdf2_sha256_c4096() {
    let key = derive(b"password", b"salt", 4096, &NoopWatchdog).unwrap();
    assert_eq!(to_hex(key.expose()), FOUR_K_ITERATIONS);
}

/// A stored record built by hand from the c=1 vector verifies.
#[test]
fn handmade_record_verifies() {
    let record = format!("{}:{ONE_ITERATION}", to_hex(b"salt"));
    let parsed: PasswordHash = record.parse().unwrap();
    assert_eq!(parsed.salt(), b"salt");
    assert_eq!(parsed.key().as_slice(), from_hex(ONE_ITERATION).unwrap().as_slice());
    assert!(verify_password("password", &record, 1, &NoopWatchdog));
    assert!(!verify_password("Password", &record, 1, &NoopWatchdog));
}

/// Uppercase hex in a stored record is accepted.
#[test]
fn uppercase_record_verifies() {
    let record = format!("{}:{}", to_hex(b"salt"), ONE_ITERATION.to_uppercase());
    assert!(verify_password("password", &record, 1, &NoopWatchdog));
}
