//! `securegen-crypto-core`: Pure cryptographic primitives for SecureGen.
//!
//! Everything the secure channel and credential vault compute lives here:
//! zero file I/O, zero logging, zero async. Callers supply a [`Watchdog`]
//! for the long blocking operations.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod encoding;
pub mod watchdog;

pub mod kdf;
pub mod symmetric;

pub mod envelope;

pub mod agreement;
pub mod hkdf;
pub mod stream;

pub mod identity;

pub mod tokens;

pub use agreement::{AgreementKeyPair, PUBLIC_KEY_LEN, SHARED_SECRET_LEN};
pub use envelope::{decrypt_with_password, encrypt_with_password, PasswordBundle};
pub use error::CryptoError;
pub use hkdf::{client_nonce, derive_session_key, CLIENT_NONCE_LEN, SESSION_KEY_LEN};
pub use identity::{DeviceIdentity, HardwareFingerprint};
pub use kdf::{
    hash_password, verify_password, PasswordHash, DEFAULT_EXPORT_ITERATIONS,
    DEFAULT_LOGIN_ITERATIONS,
};
pub use memory::{constant_time_eq, SecretBuffer, SecretBytes};
pub use stream::{apply_keystream, unxor_hex, xor_hex};
pub use tokens::{generate_client_id, generate_csrf_token, generate_pin, generate_session_id};
pub use watchdog::{CountingWatchdog, NoopWatchdog, Watchdog};
