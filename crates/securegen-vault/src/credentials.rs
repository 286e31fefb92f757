//! Credential vault: password hashing and encryption at rest.
//!
//! Every secret the device persists passes through here:
//! - login password hashes (`"<hex salt>:<hex key>"`, PBKDF2 login tier)
//! - records encrypted under the master key (base64 `iv || ciphertext`)
//! - password-wrapped export bundles (PBKDF2 export tier)
//! - the persisted login session and the BLE pairing PIN
//!
//! A record that no longer decrypts (master key regenerated, flash
//! corruption) is deleted when it is next read.

use std::sync::Arc;
use std::time::Instant;

use securegen_crypto_core::encoding::{from_base64, to_base64};
use securegen_crypto_core::{
    envelope, generate_pin, kdf, symmetric, CryptoError, Watchdog,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SecurityConfig;
use crate::error::VaultError;
use crate::login_session::{PersistentLoginSession, SESSION_FILE};
use crate::master_key::MasterKeyStore;
use crate::platform::Clock;
use crate::storage::FlashStore;

/// Encrypted BLE PIN record.
pub const BLE_PIN_FILE: &str = "ble_pin.json.enc";

/// Six-digit PIN range for BLE pairing.
pub const BLE_PIN_RANGE: std::ops::RangeInclusive<u32> = securegen_crypto_core::tokens::PIN_RANGE;

#[derive(Serialize, Deserialize)]
struct BlePinRecord {
    ble_pin: u32,
    #[serde(default)]
    timestamp: u64,
}

/// Password hashing and master-key encryption over a flash store.
pub struct CredentialVault {
    store: FlashStore,
    master: MasterKeyStore,
    config: SecurityConfig,
    clock: Arc<dyn Clock>,
    watchdog: Arc<dyn Watchdog>,
}

impl CredentialVault {
    #[must_use]
    pub fn new(
        store: FlashStore,
        master: MasterKeyStore,
        config: SecurityConfig,
        clock: Arc<dyn Clock>,
        watchdog: Arc<dyn Watchdog>,
    ) -> Self {
        Self {
            store,
            master,
            config,
            clock,
            watchdog,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SecurityConfig {
        &self.config
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    #[must_use]
    pub fn watchdog(&self) -> &dyn Watchdog {
        self.watchdog.as_ref()
    }

    #[must_use]
    pub const fn store(&self) -> &FlashStore {
        &self.store
    }

    // ── Password hashing ───────────────────────────────────────────

    /// Salted PBKDF2 hash of `password` as a `"salt:key"` hex record.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] if derivation fails.
    pub fn hash_password(&self, password: &str) -> Result<String, VaultError> {
        let started = Instant::now();
        let hash = kdf::hash_password(password, self.config.login_iterations, self.watchdog())?;
        debug!(
            elapsed_ms = started.elapsed().as_millis(),
            iterations = self.config.login_iterations,
            "password hashed"
        );
        Ok(hash.to_string())
    }

    /// Check `password` against a stored record. Malformed records never match.
    #[must_use]
    pub fn verify_password(&self, password: &str, stored: &str) -> bool {
        kdf::verify_password(
            password,
            stored,
            self.config.login_iterations,
            self.watchdog(),
        )
    }

    // ── Master-key encryption ──────────────────────────────────────

    /// Encrypt under the master key; base64 of `iv || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] on cipher failure.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let sealed = symmetric::encrypt(plaintext.as_bytes(), self.master.key())?;
        Ok(to_base64(&sealed))
    }

    /// Inverse of [`Self::encrypt`].
    ///
    /// # Errors
    ///
    /// - [`CryptoError::Encoding`] for bad base64 or non-UTF-8 plaintext
    /// - [`CryptoError::DecryptionFailed`] for short or unaligned input
    /// - [`CryptoError::InvalidPadding`] / [`CryptoError::PaddingVerificationFailed`]
    pub fn decrypt(&self, encoded: &str) -> Result<String, VaultError> {
        let sealed = from_base64(encoded.trim())?;
        let plaintext = symmetric::decrypt(&sealed, self.master.key())?;
        Ok(plaintext.to_utf8()?)
    }

    // ── Password-wrapped bundles ───────────────────────────────────

    /// `{"salt","iv","ciphertext"}` JSON under a key derived from `password`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] on derivation or cipher failure.
    pub fn encrypt_with_password(&self, plaintext: &str, password: &str) -> Result<String, VaultError> {
        Ok(envelope::encrypt_with_password(
            plaintext.as_bytes(),
            password,
            self.config.export_iterations,
            self.watchdog(),
        )?)
    }

    /// Inverse of [`Self::encrypt_with_password`].
    ///
    /// # Errors
    ///
    /// - [`CryptoError::MalformedEnvelope`] for missing or malformed fields
    /// - padding errors for a wrong password
    pub fn decrypt_with_password(&self, bundle_json: &str, password: &str) -> Result<String, VaultError> {
        let plaintext = envelope::decrypt_with_password(
            bundle_json,
            password,
            self.config.export_iterations,
            self.watchdog(),
        )?;
        Ok(plaintext.to_utf8()?)
    }

    // ── Encrypted records ──────────────────────────────────────────

    /// Encrypt `plaintext` and write it to the flash record `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on write failure or if `name` is not a
    /// plain record name.
    pub fn store_secret(&self, name: &str, plaintext: &str) -> Result<(), VaultError> {
        let encoded = self.encrypt(plaintext)?;
        self.store.write(name, encoded.as_bytes())?;
        Ok(())
    }

    /// Read and decrypt the flash record `name`.
    ///
    /// Returns `Ok(None)` if the record is absent. A record that fails to
    /// decrypt is deleted and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on read failure or if `name` is not a
    /// plain record name.
    pub fn load_secret(&self, name: &str) -> Result<Option<String>, VaultError> {
        let Some(bytes) = self.store.read(name)? else {
            return Ok(None);
        };
        let decoded = String::from_utf8(bytes)
            .map_err(|_| VaultError::Crypto(CryptoError::Encoding("record is not UTF-8".into())))
            .and_then(|encoded| self.decrypt(&encoded));
        match decoded {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(e) => {
                warn!(record = name, error = %e, "undecryptable record removed");
                self.store.remove(name)?;
                Ok(None)
            }
        }
    }

    /// Delete the flash record `name`; `Ok(false)` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on delete failure.
    pub fn delete_secret(&self, name: &str) -> Result<bool, VaultError> {
        Ok(self.store.remove(name)?)
    }

    // ── Login session persistence ──────────────────────────────────

    /// Persist a login session, stamped with the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on write failure.
    pub fn save_session(
        &self,
        session_id: &str,
        csrf_token: &str,
        created_time_millis: u32,
    ) -> Result<(), VaultError> {
        let record = PersistentLoginSession::new(
            session_id.to_owned(),
            csrf_token.to_owned(),
            created_time_millis,
            self.clock.epoch_secs(),
        );
        let json = serde_json::to_string(&record)?;
        self.store_secret(SESSION_FILE, &json)?;
        debug!(epoch_based = record.uses_epoch(), "login session saved");
        Ok(())
    }

    /// Load the persisted login session if it is still valid.
    ///
    /// Returns `Ok(None)` when:
    /// - the configured lifetime is "until reboot" (the file is left alone)
    /// - there is no saved session
    /// - the record fails to decrypt or parse (file deleted)
    /// - the session has expired (file deleted)
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on flash failure.
    pub fn load_session(&self) -> Result<Option<PersistentLoginSession>, VaultError> {
        let duration = self.config.session_duration;
        if duration.is_until_reboot() {
            debug!("until-reboot sessions are never restored");
            return Ok(None);
        }

        let Some(json) = self.load_secret(SESSION_FILE)? else {
            return Ok(None);
        };
        let record: PersistentLoginSession = match serde_json::from_str(&json) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "persisted session unreadable, removing");
                self.store.remove(SESSION_FILE)?;
                return Ok(None);
            }
        };

        match record.check_validity(
            self.clock.monotonic_millis(),
            self.clock.epoch_secs(),
            duration.lifetime_secs(),
        ) {
            Ok(()) => {
                info!(epoch_based = record.uses_epoch(), "persisted session restored");
                Ok(Some(record))
            }
            Err(reason) => {
                info!(%reason, "persisted session expired, removing");
                self.store.remove(SESSION_FILE)?;
                Ok(None)
            }
        }
    }

    /// Delete the persisted login session.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on delete failure.
    pub fn clear_session(&self) -> Result<(), VaultError> {
        self.store.remove(SESSION_FILE)?;
        Ok(())
    }

    // ── BLE pairing PIN ────────────────────────────────────────────

    /// The BLE pairing PIN, generating and persisting one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if a new PIN cannot be persisted.
    pub fn ble_pin(&self) -> Result<u32, VaultError> {
        if let Some(json) = self.load_secret(BLE_PIN_FILE)? {
            match serde_json::from_str::<BlePinRecord>(&json) {
                Ok(record) if BLE_PIN_RANGE.contains(&record.ble_pin) => return Ok(record.ble_pin),
                _ => warn!("stored BLE PIN invalid, generating a new one"),
            }
        }
        let pin = generate_pin(BLE_PIN_RANGE);
        self.save_ble_pin(pin)?;
        info!("BLE PIN generated");
        Ok(pin)
    }

    /// Persist a user-chosen BLE PIN.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Serialization`] for a PIN outside
    /// 100000..=999999, [`VaultError::Io`] on write failure.
    pub fn save_ble_pin(&self, pin: u32) -> Result<(), VaultError> {
        if !BLE_PIN_RANGE.contains(&pin) {
            return Err(VaultError::Serialization(format!(
                "BLE PIN must be six digits, got {pin}"
            )));
        }
        let record = BlePinRecord {
            ble_pin: pin,
            timestamp: self.clock.epoch_secs(),
        };
        self.store_secret(BLE_PIN_FILE, &serde_json::to_string(&record)?)
    }

    #[must_use]
    pub fn is_ble_pin_configured(&self) -> bool {
        self.store.exists(BLE_PIN_FILE)
    }

    /// Forget the BLE PIN; the next [`Self::ble_pin`] generates a new one.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on delete failure.
    pub fn clear_ble_pin(&self) -> Result<(), VaultError> {
        self.store.remove(BLE_PIN_FILE)?;
        Ok(())
    }
}
