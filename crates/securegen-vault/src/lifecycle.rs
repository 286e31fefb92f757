//! Login session lifecycle: create, authenticate, restore, clear.
//!
//! The active login lives in RAM; a copy is persisted through the
//! [`CredentialVault`] unless the lifetime is "until reboot". At startup a
//! still-valid persisted session is restored so a browser stays logged in
//! across a power cycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use securegen_crypto_core::{constant_time_eq, generate_csrf_token, generate_session_id};
use tracing::{debug, info, warn};

use crate::credentials::CredentialVault;
use crate::error::{SessionError, VaultError};
use crate::handshake::HandshakeCoordinator;
use crate::login_session::PersistentLoginSession;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// Tokens handed to the browser after login.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginTokens {
    pub session_id: String,
    pub csrf_token: String,
}

impl std::fmt::Debug for LoginTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginTokens").finish_non_exhaustive()
    }
}

struct ActiveLogin {
    session_id: String,
    csrf_token: String,
    created_millis: u32,
    created_epoch: u64,
    secure_client: Option<String>,
}

impl From<PersistentLoginSession> for ActiveLogin {
    fn from(record: PersistentLoginSession) -> Self {
        Self {
            session_id: record.session_id,
            csrf_token: record.csrf_token,
            created_millis: record.created_time_millis,
            created_epoch: record.created_time_epoch,
            secure_client: None,
        }
    }
}

/// Owns the single web login of the device.
pub struct SessionLifecycleManager {
    vault: Arc<CredentialVault>,
    coordinator: Arc<HandshakeCoordinator>,
    active: Mutex<Option<ActiveLogin>>,
}

impl SessionLifecycleManager {
    #[must_use]
    pub const fn new(vault: Arc<CredentialVault>, coordinator: Arc<HandshakeCoordinator>) -> Self {
        Self {
            vault,
            coordinator,
            active: Mutex::new(None),
        }
    }

    /// Restore a persisted session at server start. Returns `true` if one was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on flash failure.
    pub fn restore(&self) -> Result<bool, VaultError> {
        let restored = self.vault.load_session()?;
        let found = restored.is_some();
        *self.state() = restored.map(ActiveLogin::from);
        if found {
            info!("login session restored");
        }
        Ok(found)
    }

    /// Start a new login, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the session cannot be persisted.
    pub fn create_session(&self) -> Result<LoginTokens, VaultError> {
        let tokens = LoginTokens {
            session_id: generate_session_id(),
            csrf_token: generate_csrf_token(),
        };
        let clock = self.vault.clock();
        let created_millis = clock.monotonic_millis();

        // The state lock also guards the session file.
        let mut state = self.state();
        if self.vault.config().session_duration.is_until_reboot() {
            // Nothing to persist; drop any leftover from a longer setting.
            self.vault.clear_session()?;
        } else {
            self.vault
                .save_session(&tokens.session_id, &tokens.csrf_token, created_millis)?;
        }
        let previous = state.replace(ActiveLogin {
            session_id: tokens.session_id.clone(),
            csrf_token: tokens.csrf_token.clone(),
            created_millis,
            created_epoch: clock.epoch_secs(),
            secure_client: None,
        });
        drop(state);

        self.release_secure_client(previous);
        info!(
            until_reboot = self.vault.config().session_duration.is_until_reboot(),
            "login session created"
        );
        Ok(tokens)
    }

    /// `true` if `credential` (a `Cookie` header, `Authorization: Bearer`
    /// value or the bare token) names the active, unexpired session.
    ///
    /// An expired session is cleared as a side effect.
    #[must_use]
    pub fn is_authenticated(&self, credential: &str) -> bool {
        let Some(token) = extract_session_token(credential) else {
            return false;
        };
        let mut state = self.state();
        let Some(active) = state.as_ref() else {
            return false;
        };
        if !constant_time_eq(token.as_bytes(), active.session_id.as_bytes()) {
            return false;
        }
        match self.check_expiry(active) {
            Ok(()) => true,
            Err(e) => {
                info!(error = %e, "login session expired");
                let expired = state.take();
                if let Err(e) = self.vault.clear_session() {
                    warn!(error = %e, "failed to remove persisted session");
                }
                drop(state);
                self.release_secure_client(expired);
                false
            }
        }
    }

    /// Constant-time check of a CSRF token against the active session.
    #[must_use]
    pub fn verify_csrf(&self, token: &str) -> bool {
        self.state().as_ref().is_some_and(|active| {
            !token.is_empty() && constant_time_eq(token.as_bytes(), active.csrf_token.as_bytes())
        })
    }

    /// Log out: forget the session in RAM and on flash, and drop the bound
    /// secure channel.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the persisted copy cannot be removed.
    pub fn clear_session(&self) -> Result<(), VaultError> {
        let mut state = self.state();
        let previous = state.take();
        let cleared = self.vault.clear_session();
        drop(state);

        self.release_secure_client(previous);
        cleared?;
        info!("login session cleared");
        Ok(())
    }

    /// Tie a secure channel `client_id` to the active login so logout drops it.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when nobody is logged in.
    pub fn bind_secure_client(&self, client_id: &str) -> Result<(), VaultError> {
        let mut state = self.state();
        let active = state.as_mut().ok_or(SessionError::NotFound)?;
        active.secure_client = Some(client_id.to_owned());
        debug!("secure client bound to login");
        Ok(())
    }

    #[must_use]
    pub fn has_active_session(&self) -> bool {
        self.state().is_some()
    }

    /// CSRF token of the active session, for rendering into pages.
    #[must_use]
    pub fn csrf_token(&self) -> Option<String> {
        self.state().as_ref().map(|a| a.csrf_token.clone())
    }

    fn check_expiry(&self, active: &ActiveLogin) -> Result<(), SessionError> {
        let duration = self.vault.config().session_duration;
        if duration.is_until_reboot() {
            return Ok(());
        }
        let clock = self.vault.clock();
        let record = PersistentLoginSession::new(
            String::new(),
            String::new(),
            active.created_millis,
            active.created_epoch,
        );
        record
            .check_validity(
                clock.monotonic_millis(),
                clock.epoch_secs(),
                duration.lifetime_secs(),
            )
            .map_err(|_| SessionError::Expired)
    }

    /// Drop the secure channel bound to a login that just ended.
    fn release_secure_client(&self, login: Option<ActiveLogin>) {
        if let Some(client) = login.and_then(|l| l.secure_client) {
            self.coordinator.invalidate(&client);
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<ActiveLogin>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Session token from a `Cookie` header, a `Bearer` value, or the bare token.
#[must_use]
pub fn extract_session_token(credential: &str) -> Option<&str> {
    let credential = credential.trim();
    if let Some(rest) = credential.strip_prefix("Bearer") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest.trim()).filter(|t| !t.is_empty());
        }
    }
    if credential.contains('=') {
        return credential.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name.trim() == SESSION_COOKIE && !value.is_empty()).then_some(value.trim())
        });
    }
    Some(credential).filter(|t| !t.is_empty())
}
