#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for password-wrapped bundles.

use proptest::prelude::*;
use securegen_crypto_core::envelope::{decrypt_with_password, encrypt_with_password};
use securegen_crypto_core::NoopWatchdog;

/// Low iteration count keeps each case fast.
const PROP_ITERATIONS: u32 = 2;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Bundle roundtrip recovers the plaintext for any password.
    #[test]
    fn bundle_roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        password in ".{0,40}",
    ) {
        let json = encrypt_with_password(&plaintext, &password, PROP_ITERATIONS, &NoopWatchdog)
            .expect("seal should succeed");
        let opened = decrypt_with_password(&json, &password, PROP_ITERATIONS, &NoopWatchdog)
            .expect("open should succeed");
        prop_assert_eq!(opened.expose(), plaintext.as_slice());
    }

    /// A different password never returns the original plaintext.
    #[test]
    fn wrong_password_never_roundtrips(
        plaintext in proptest::collection::vec(any::<u8>(), 1..128),
        password in "[a-z]{4,12}",
    ) {
        let json = encrypt_with_password(&plaintext, &password, PROP_ITERATIONS, &NoopWatchdog)
            .unwrap();
        let wrong = format!("{password}!");
        if let Ok(opened) = decrypt_with_password(&json, &wrong, PROP_ITERATIONS, &NoopWatchdog) {
            prop_assert_ne!(opened.expose(), plaintext.as_slice());
        }
    }
}
