//! Cryptographic error types for `securegen-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
///
/// Every variant is recoverable: callers map them to a structured error
/// response and carry on. Nothing in this crate panics on bad input.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Ciphertext is too short, not block-aligned, or the cipher rejected it.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Final padding byte is zero, larger than a block, or larger than the buffer.
    #[error("invalid padding")]
    InvalidPadding,

    /// One of the padding bytes does not equal the padding length.
    #[error("padding verification failed")]
    PaddingVerificationFailed,

    /// A JSON bundle or envelope is missing fields or carries bad encodings.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// PBKDF2 or HKDF parameter rejected (zero iterations, bad output length).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure (bad key or IV length).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// ECDH public key decoding or shared secret computation failed.
    #[error("key agreement failed: {0}")]
    KeyAgreement(String),

    /// Hex or base64 decoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// CSPRNG failure while filling secret memory.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
