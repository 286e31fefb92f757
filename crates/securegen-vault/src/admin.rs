//! Web admin account: a single username/password pair.
//!
//! - `web_admin.json`: `{username, hash}` encrypted under the master key
//! - `login_state.json`: plain `{failed_attempts, last_attempt_at}` so a
//!   lockout survives a reboot

use std::sync::Arc;

use securegen_crypto_core::constant_time_eq;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::credentials::CredentialVault;
use crate::error::VaultError;

/// Encrypted credential record.
pub const ADMIN_FILE: &str = "web_admin.json";

/// Plain-JSON failed-login counter.
pub const LOGIN_STATE_FILE: &str = "login_state.json";

// ---------------------------------------------------------------------------
// Brute-force protection
// ---------------------------------------------------------------------------

/// Lockout schedule: (threshold, `lockout_secs`).
/// If `failed_attempts >= threshold`, the given lockout applies.
/// Checked in descending order, first match wins.
const LOCKOUT_SCHEDULE: &[(u32, u64)] = &[
    (5, 900), // 5+ failures → 15 minutes
    (4, 300), //  4 failures → 5 minutes
    (3, 60),  //  3 failures → 1 minute
];

fn required_lockout_secs(attempts: u32) -> u64 {
    for &(threshold, lockout) in LOCKOUT_SCHEDULE {
        if attempts >= threshold {
            return lockout;
        }
    }
    0
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct LoginState {
    #[serde(default)]
    failed_attempts: u32,
    #[serde(default)]
    last_attempt_at: Option<u64>,
}

impl LoginState {
    fn remaining_secs(&self, now_secs: u64) -> Option<u64> {
        let lockout = required_lockout_secs(self.failed_attempts);
        if lockout == 0 {
            return None;
        }
        let last = self.last_attempt_at?;
        let elapsed = now_secs.saturating_sub(last);
        (elapsed < lockout).then_some(lockout.saturating_sub(elapsed))
    }
}

#[derive(Serialize, Deserialize)]
struct AdminRecord {
    username: String,
    hash: String,
}

// ---------------------------------------------------------------------------
// Admin credentials
// ---------------------------------------------------------------------------

/// The admin account backed by a [`CredentialVault`].
pub struct AdminCredentials {
    vault: Arc<CredentialVault>,
}

impl AdminCredentials {
    #[must_use]
    pub const fn new(vault: Arc<CredentialVault>) -> Self {
        Self { vault }
    }

    /// `true` once an admin account exists and decrypts.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on flash failure.
    pub fn is_registered(&self) -> Result<bool, VaultError> {
        Ok(self.load_record()?.is_some())
    }

    /// Create the admin account.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AdminAlreadyRegistered`] if an account exists
    /// - [`VaultError::InvalidCredentials`] for an empty username or password
    pub fn register(&self, username: &str, password: &str) -> Result<(), VaultError> {
        if self.is_registered()? {
            return Err(VaultError::AdminAlreadyRegistered);
        }
        if username.is_empty() || password.is_empty() {
            return Err(VaultError::InvalidCredentials);
        }
        self.write_record(username, password)?;
        self.save_state(&LoginState::default())?;
        info!("admin account registered");
        Ok(())
    }

    /// Check a login attempt, applying the lockout schedule.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AdminLocked`] while a lockout is running (the attempt
    ///   is not evaluated and not counted)
    /// - [`VaultError::AdminNotRegistered`] before registration
    /// - [`VaultError::InvalidCredentials`] on mismatch
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<(), VaultError> {
        let now = self.vault.clock().epoch_secs();
        let mut state = self.load_state();
        if let Some(remaining_secs) = state.remaining_secs(now) {
            warn!(remaining_secs, "admin login refused during lockout");
            return Err(VaultError::AdminLocked { remaining_secs });
        }

        let record = self.load_record()?.ok_or(VaultError::AdminNotRegistered)?;
        // Evaluate both halves so timing does not reveal which one failed.
        let user_ok = constant_time_eq(username.as_bytes(), record.username.as_bytes());
        let pass_ok = self.vault.verify_password(password, &record.hash);

        if user_ok && pass_ok {
            if state.failed_attempts > 0 {
                self.save_state(&LoginState::default())?;
            }
            info!("admin login succeeded");
            Ok(())
        } else {
            state.failed_attempts = state.failed_attempts.saturating_add(1);
            state.last_attempt_at = Some(now);
            self.save_state(&state)?;
            warn!(failed_attempts = state.failed_attempts, "admin login failed");
            Err(VaultError::InvalidCredentials)
        }
    }

    /// Replace the password after checking the current one.
    ///
    /// # Errors
    ///
    /// Same as [`Self::verify_credentials`], plus
    /// [`VaultError::InvalidCredentials`] for an empty new password.
    pub fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), VaultError> {
        self.verify_credentials(username, current_password)?;
        if new_password.is_empty() {
            return Err(VaultError::InvalidCredentials);
        }
        self.write_record(username, new_password)?;
        info!("admin password changed");
        Ok(())
    }

    /// Seconds left in the current lockout, if any.
    #[must_use]
    pub fn lockout_remaining_secs(&self) -> Option<u64> {
        self.load_state()
            .remaining_secs(self.vault.clock().epoch_secs())
    }

    // -- storage ------------------------------------------------------------

    fn write_record(&self, username: &str, password: &str) -> Result<(), VaultError> {
        let record = AdminRecord {
            username: username.to_owned(),
            hash: self.vault.hash_password(password)?,
        };
        self.vault
            .store_secret(ADMIN_FILE, &serde_json::to_string(&record)?)
    }

    fn load_record(&self) -> Result<Option<AdminRecord>, VaultError> {
        let Some(json) = self.vault.load_secret(ADMIN_FILE)? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(error = %e, "admin record unreadable, removing");
                self.vault.delete_secret(ADMIN_FILE)?;
                Ok(None)
            }
        }
    }

    /// Missing or corrupt state reads as zero failures.
    fn load_state(&self) -> LoginState {
        self.vault
            .store()
            .read_string(LOGIN_STATE_FILE)
            .ok()
            .flatten()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    fn save_state(&self, state: &LoginState) -> Result<(), VaultError> {
        let json = serde_json::to_string(state)?;
        self.vault.store().write(LOGIN_STATE_FILE, json.as_bytes())?;
        Ok(())
    }
}
