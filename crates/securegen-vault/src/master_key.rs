//! The device master key: 32 random bytes kept verbatim in `device.key`.
//!
//! Created on first boot, loaded afterwards. A file of any other size is
//! treated as corrupt and replaced, which makes every record encrypted under
//! the old key unreadable. Those records are cleaned up lazily when their
//! decryption fails.

use securegen_crypto_core::SecretBytes;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::error::KeyStoreError;
use crate::storage::FlashStore;

/// Master key length in bytes.
pub const MASTER_KEY_LEN: usize = 32;

/// Flash record holding the raw key.
pub const MASTER_KEY_FILE: &str = "device.key";

/// The loaded master key. Read-only after construction.
#[derive(Debug)]
pub struct MasterKeyStore {
    key: SecretBytes<MASTER_KEY_LEN>,
    created: bool,
}

impl MasterKeyStore {
    /// Load the key from flash, creating (or replacing a corrupt) one.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Io`] if the key cannot be read or persisted.
    /// This is the one fatal error at boot.
    pub fn load_or_create(store: &FlashStore) -> Result<Self, KeyStoreError> {
        match Self::load(store) {
            Ok(Some(key)) => {
                info!("master key loaded");
                return Ok(Self {
                    key,
                    created: false,
                });
            }
            Ok(None) => info!("no master key on flash, generating"),
            Err(KeyStoreError::CorruptKeyFile { actual_len }) => {
                warn!(actual_len, "master key file corrupt, regenerating");
            }
            Err(e) => return Err(e),
        }

        let key = SecretBytes::<MASTER_KEY_LEN>::random()
            .map_err(|e| KeyStoreError::Io(std::io::Error::other(e.to_string())))?;
        store.write(MASTER_KEY_FILE, key.expose())?;
        info!("master key created");
        Ok(Self { key, created: true })
    }

    /// Read an existing key without creating one.
    ///
    /// # Errors
    ///
    /// - [`KeyStoreError::CorruptKeyFile`] if the file is not 32 bytes
    /// - [`KeyStoreError::Io`] on read failure
    pub fn load(store: &FlashStore) -> Result<Option<SecretBytes<MASTER_KEY_LEN>>, KeyStoreError> {
        let Some(mut bytes) = store.read(MASTER_KEY_FILE)? else {
            return Ok(None);
        };
        let result = SecretBytes::from_slice(&bytes).map_err(|_| KeyStoreError::CorruptKeyFile {
            actual_len: bytes.len(),
        });
        bytes.zeroize();
        result.map(Some)
    }

    /// Raw key bytes for the cipher.
    #[must_use]
    pub const fn key(&self) -> &[u8; MASTER_KEY_LEN] {
        self.key.expose()
    }

    /// `true` if this boot generated the key.
    #[must_use]
    pub const fn was_created(&self) -> bool {
        self.created
    }
}
