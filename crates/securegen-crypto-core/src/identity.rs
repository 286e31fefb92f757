//! Device static key derived from hardware identifiers.
//!
//! The key is SHA-256 over a fixed 128-byte fingerprint buffer, base64
//! encoded. It is computed on first use, cached for the process lifetime and
//! never written to flash. Anyone who can read the same hardware registers
//! can recompute it, so it only raises the bar against passive observers of
//! the first handshake.
//!
//! Buffer layout (little-endian integers, zero-filled):
//!
//! | offset | field          | size |
//! |--------|----------------|------|
//! | 0      | chip id        | 8    |
//! | 8      | flash mode     | 4    |
//! | 12     | chip revision  | 4    |
//! | 16     | flash size     | 4    |
//! | 20     | flash speed    | 4    |
//! | 24     | chip model     | ≤ 32 |
//! | 24+n   | salt           | rest |

use crate::encoding::to_base64;
use ring::digest;
use std::fmt;
use std::sync::OnceLock;

/// Size of the fingerprint buffer fed to SHA-256.
pub const FINGERPRINT_LEN: usize = 128;

/// Longest chip model prefix copied into the buffer.
const MAX_MODEL_LEN: usize = 32;

/// Fixed salt appended after the hardware fields, truncated to fit.
const FINGERPRINT_SALT: &[u8] = b"TOTP-DEVICE-STATIC-2024-ESP32-FINGERPRINT";

/// Hardware identifiers read once at boot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HardwareFingerprint {
    /// Factory-programmed MAC-derived chip id.
    pub chip_id: u64,
    pub flash_mode: u32,
    pub chip_revision: u32,
    /// Flash size in bytes.
    pub flash_size: u32,
    /// Flash clock in Hz.
    pub flash_speed: u32,
    pub chip_model: String,
}

impl HardwareFingerprint {
    /// Deterministic values for host builds, where the registers do not exist.
    #[must_use]
    pub fn host_stand_in() -> Self {
        Self {
            chip_id: 0x0000_A4CF_12B4_5E68,
            flash_mode: 2,
            chip_revision: 3,
            flash_size: 4_194_304,
            flash_speed: 80_000_000,
            chip_model: "ESP32-D0WD-V3".to_owned(),
        }
    }

    /// Assemble the 128-byte fingerprint buffer.
    #[must_use]
    pub fn to_buffer(&self) -> [u8; FINGERPRINT_LEN] {
        let mut buf = [0u8; FINGERPRINT_LEN];
        let mut writer = BufWriter {
            buf: &mut buf,
            pos: 0,
        };
        writer.put(&self.chip_id.to_le_bytes());
        writer.put(&self.flash_mode.to_le_bytes());
        writer.put(&self.chip_revision.to_le_bytes());
        writer.put(&self.flash_size.to_le_bytes());
        writer.put(&self.flash_speed.to_le_bytes());
        let model = self.chip_model.as_bytes();
        writer.put(&model[..model.len().min(MAX_MODEL_LEN)]);
        writer.put(FINGERPRINT_SALT);
        buf
    }

    /// SHA-256 of the fingerprint buffer.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let hash = digest::digest(&digest::SHA256, &self.to_buffer());
        let mut out = [0u8; 32];
        out.copy_from_slice(hash.as_ref());
        out
    }
}

/// Cursor that truncates silently at the end of the buffer.
struct BufWriter<'a> {
    buf: &'a mut [u8; FINGERPRINT_LEN],
    pos: usize,
}

impl BufWriter<'_> {
    fn put(&mut self, bytes: &[u8]) {
        let room = FINGERPRINT_LEN.saturating_sub(self.pos);
        let n = bytes.len().min(room);
        let end = self.pos.saturating_add(n);
        self.buf[self.pos..end].copy_from_slice(&bytes[..n]);
        self.pos = end;
    }
}

/// The device's identity and lazily derived static key.
pub struct DeviceIdentity {
    hardware: HardwareFingerprint,
    static_key: OnceLock<String>,
}

impl DeviceIdentity {
    #[must_use]
    pub const fn new(hardware: HardwareFingerprint) -> Self {
        Self {
            hardware,
            static_key: OnceLock::new(),
        }
    }

    /// Base64 SHA-256 of the hardware fingerprint, computed once.
    #[must_use]
    pub fn static_key(&self) -> &str {
        self.static_key
            .get_or_init(|| to_base64(&self.hardware.digest()))
    }

    #[must_use]
    pub const fn hardware(&self) -> &HardwareFingerprint {
        &self.hardware
    }

    /// One-line summary for diagnostics. Never includes the key.
    #[must_use]
    pub fn hardware_info(&self) -> String {
        let hw = &self.hardware;
        format!(
            "chip={} rev={} id={:016x} flash={}B@{}Hz mode={}",
            hw.chip_model,
            hw.chip_revision,
            hw.chip_id,
            hw.flash_size,
            hw.flash_speed,
            hw.flash_mode
        )
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("hardware", &self.hardware)
            .field("static_key", &"***")
            .finish()
    }
}
