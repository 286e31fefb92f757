//! `securegen-vault`: Device-side services for SecureGen.
//!
//! Everything that touches flash or keeps state between requests:
//!
//! - master key and encrypted records ([`MasterKeyStore`], [`CredentialVault`])
//! - the secure channel ([`HandshakeCoordinator`], [`SecureChannelClient`])
//! - web login sessions ([`SessionLifecycleManager`]) and the admin account
//! - startup wiring ([`DeviceContext`])

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod config;
pub mod error;
pub mod platform;
pub mod storage;

pub mod master_key;

pub mod credentials;
pub mod login_session;

pub mod admin;

pub mod handshake;

pub mod lifecycle;

pub mod device;

pub use admin::AdminCredentials;
pub use config::{SecurityConfig, SessionDuration, TimingJitter};
pub use credentials::CredentialVault;
pub use device::{BootOptions, DeviceContext};
pub use error::{HandshakeError, KeyStoreError, SessionError, VaultError};
pub use handshake::{
    HandshakeCoordinator, SecureChannelClient, SecureEnvelope, SecureSession, SessionState,
};
pub use lifecycle::{extract_session_token, LoginTokens, SessionLifecycleManager};
pub use login_session::{ExpiryReason, PersistentLoginSession};
pub use master_key::MasterKeyStore;
pub use platform::{Clock, ManualClock, SystemClock};
pub use storage::FlashStore;
