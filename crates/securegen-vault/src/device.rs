//! Device startup: wires every service from a data directory.

use std::path::PathBuf;
use std::sync::Arc;

use securegen_crypto_core::{DeviceIdentity, HardwareFingerprint, NoopWatchdog, Watchdog};
use tracing::{error, info};

use crate::admin::AdminCredentials;
use crate::config::SecurityConfig;
use crate::credentials::CredentialVault;
use crate::error::VaultError;
use crate::handshake::HandshakeCoordinator;
use crate::lifecycle::SessionLifecycleManager;
use crate::master_key::MasterKeyStore;
use crate::platform::{Clock, SystemClock};
use crate::storage::FlashStore;

/// Inputs to [`DeviceContext::boot`].
pub struct BootOptions {
    /// Flash filesystem root.
    pub data_dir: PathBuf,
    pub hardware: HardwareFingerprint,
    pub clock: Arc<dyn Clock>,
    pub watchdog: Arc<dyn Watchdog>,
    /// Overrides `security.json` when set.
    pub config: Option<SecurityConfig>,
}

impl BootOptions {
    /// Host defaults: stand-in hardware, system clock, no watchdog.
    #[must_use]
    pub fn host(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            hardware: HardwareFingerprint::host_stand_in(),
            clock: Arc::new(SystemClock::new()),
            watchdog: Arc::new(NoopWatchdog),
            config: None,
        }
    }
}

/// Every long-lived service of a running device.
pub struct DeviceContext {
    pub identity: Arc<DeviceIdentity>,
    pub vault: Arc<CredentialVault>,
    pub coordinator: Arc<HandshakeCoordinator>,
    pub sessions: SessionLifecycleManager,
    pub admin: AdminCredentials,
}

impl DeviceContext {
    /// Bring the device up.
    ///
    /// Order: config, flash, master key, vault, secure layer, then restore
    /// any persisted login.
    ///
    /// # Errors
    ///
    /// - [`VaultError::KeyStore`] if the master key cannot be read or created
    /// - [`VaultError::Io`] if the data directory is unusable
    pub fn boot(options: BootOptions) -> Result<Self, VaultError> {
        let BootOptions {
            data_dir,
            hardware,
            clock,
            watchdog,
            config,
        } = options;

        let config = config.map_or_else(|| SecurityConfig::load(&data_dir), SecurityConfig::sanitized);
        let store = FlashStore::open(&data_dir)?;
        let master = MasterKeyStore::load_or_create(&store).inspect_err(|e| {
            error!(error = %e, "master key unavailable, boot aborted");
        })?;

        let identity = Arc::new(DeviceIdentity::new(hardware));
        info!(hardware = %identity.hardware_info(), "device identity ready");

        let coordinator = Arc::new(HandshakeCoordinator::new(
            Arc::clone(&identity),
            &config,
            Arc::clone(&clock),
            Arc::clone(&watchdog),
        ));
        let vault = Arc::new(CredentialVault::new(store, master, config, clock, watchdog));

        coordinator.begin();
        let sessions = SessionLifecycleManager::new(Arc::clone(&vault), Arc::clone(&coordinator));
        sessions.restore()?;
        let admin = AdminCredentials::new(Arc::clone(&vault));

        info!("device services up");
        Ok(Self {
            identity,
            vault,
            coordinator,
            sessions,
            admin,
        })
    }

    /// Tear down the secure layer. Persisted state is left alone.
    pub fn shutdown(&self) {
        self.coordinator.end();
        info!("device services down");
    }
}
