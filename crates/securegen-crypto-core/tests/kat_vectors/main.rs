#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Known-answer tests for the primitives under the secure channel and vault.
//!
//! - AES-256-CBC against NIST SP 800-38A F.2.5
//! - PBKDF2-HMAC-SHA256 against published vectors
//! - Session-key HKDF against `ring::hkdf`

mod aes_cbc;
mod hkdf_session;
mod pbkdf2_sha256;
