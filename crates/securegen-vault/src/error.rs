//! Error types for `securegen-vault`.
//!
//! Nothing here is fatal except [`KeyStoreError::Io`] during first-boot key
//! creation. Every other error is turned into a JSON error body and the
//! device carries on.

use securegen_crypto_core::CryptoError;
use serde_json::{json, Value};
use thiserror::Error;

/// Key-exchange failures. Messages are the strings browsers already match on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Client public key is not 65-byte uncompressed hex on P-256.
    #[error("Invalid public key format")]
    InvalidPublicKeyFormat,

    /// Shared secret computation failed.
    #[error("ECDH failed")]
    EcdhComputeFailure,

    /// HKDF could not produce a session key.
    #[error("Key derivation failed")]
    KeyDerivationFailure,

    /// The session table is full and this client has no entry yet.
    #[error("Session limit exceeded")]
    SessionLimitExceeded,

    /// No server key pair: `begin()` has not run or `end()` already did.
    #[error("Server not initialized")]
    ServerNotInitialized,

    /// Protected handshake: the wrapped client key could not be opened.
    #[error("Key decryption failed")]
    KeyUnwrapFailed,

    /// Protected handshake: the server key could not be wrapped.
    #[error("Server key encryption failed")]
    KeyWrapFailed,

    /// Request body is not JSON or lacks a required field.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl HandshakeError {
    /// `{"type":"keyexchange","status":"error","message":...}`
    #[must_use]
    pub fn to_response_json(&self) -> Value {
        json!({
            "type": "keyexchange",
            "status": "error",
            "message": self.to_string(),
        })
    }
}

/// Per-client transport session failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Login session is past its lifetime.
    #[error("session expired")]
    Expired,

    /// No secure session for this client id.
    #[error("secure session not found")]
    NotFound,

    /// Session exists but the key exchange has not completed.
    #[error("secure session not established")]
    NotEstablished,

    /// Inbound counter is not greater than the last accepted one.
    #[error("replay detected: counter {counter} <= {last_accepted}")]
    ReplayDetected {
        /// Counter carried by the rejected message.
        counter: u64,
        /// Highest counter accepted so far.
        last_accepted: u64,
    },
}

/// Master key file failures.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Key file has the wrong size. Recovered by regenerating the key.
    #[error("corrupt key file: {actual_len} bytes (expected 32)")]
    CorruptKeyFile {
        /// Size of the file found on flash.
        actual_len: usize,
    },

    /// Flash read/write failed. Fatal during first boot.
    #[error("key store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    /// I/O error from the flash store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record or request body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Too many failed admin logins; lockout still running.
    #[error("login locked: {remaining_secs}s remaining")]
    AdminLocked {
        /// Seconds until the next attempt is allowed.
        remaining_secs: u64,
    },

    /// Username or password did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// `register` called when an admin account already exists.
    #[error("admin already registered")]
    AdminAlreadyRegistered,

    /// Admin operation before registration.
    #[error("admin not registered")]
    AdminNotRegistered,
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl VaultError {
    /// Structured error body for HTTP responses.
    ///
    /// Handshake failures keep their `"type":"keyexchange"` shape; everything
    /// else is `{"status":"error","message":...}`.
    #[must_use]
    pub fn to_response_json(&self) -> Value {
        match self {
            Self::Handshake(e) => e.to_response_json(),
            other => json!({
                "status": "error",
                "message": other.to_string(),
            }),
        }
    }

    /// `true` for a counter replay, which callers may want to log louder.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        matches!(self, Self::Session(SessionError::ReplayDetected { .. }))
    }
}
