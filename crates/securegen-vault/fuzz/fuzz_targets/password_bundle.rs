//! Fuzz target for `{"salt","iv","ciphertext"}` bundles.
//!
//! Uses a single PBKDF2 iteration so the fuzzer spends its time in the
//! parser and padding checks; must never panic.
//!
//! # Usage
//!
//! ```sh
//! cd crates/securegen-vault
//! cargo +nightly fuzz run password_bundle -- -max_len=4096
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use securegen_crypto_core::{decrypt_with_password, NoopWatchdog, PasswordBundle};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = PasswordBundle::from_json(s);
        let _ = decrypt_with_password(s, "fuzz", 1, &NoopWatchdog);
    }
});
