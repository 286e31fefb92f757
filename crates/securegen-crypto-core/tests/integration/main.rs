#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Cross-module integration tests for `securegen-crypto-core`.

mod agreement_roundtrip;
mod identity_envelope;
