//! Clock seams for session expiry.
//!
//! The device has two clocks: a 32-bit millisecond uptime counter that
//! restarts at every boot and wraps after ~49 days, and an NTP-synced wall
//! clock that reads near zero until the first sync. Both are needed to judge
//! whether a persisted login session is still valid.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic uptime and wall-clock time.
pub trait Clock: Send + Sync {
    /// Milliseconds since boot, wrapping at `u32::MAX`.
    fn monotonic_millis(&self) -> u32;

    /// Seconds since the Unix epoch. Implausibly small until the clock is set.
    fn epoch_secs(&self) -> u64;
}

/// Host clock: uptime from process start, wall time from the OS.
#[derive(Debug)]
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn monotonic_millis(&self) -> u32 {
        // Truncation reproduces the device counter's wrap.
        self.boot.elapsed().as_millis() as u32
    }

    fn epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Hand-driven clock for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU32,
    epoch: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub const fn new(monotonic_millis: u32, epoch_secs: u64) -> Self {
        Self {
            millis: AtomicU32::new(monotonic_millis),
            epoch: AtomicU64::new(epoch_secs),
        }
    }

    pub fn set_monotonic_millis(&self, millis: u32) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn set_epoch_secs(&self, secs: u64) {
        self.epoch.store(secs, Ordering::SeqCst);
    }

    /// Advance both clocks by `secs` seconds; uptime wraps like the device's.
    pub fn advance_secs(&self, secs: u32) {
        let delta = secs.wrapping_mul(1_000);
        let now = self.millis.load(Ordering::SeqCst);
        self.millis.store(now.wrapping_add(delta), Ordering::SeqCst);
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.epoch
            .store(epoch.saturating_add(u64::from(secs)), Ordering::SeqCst);
    }

    /// Simulate a power cycle: uptime restarts at `uptime_millis`, wall time keeps going.
    pub fn reboot(&self, uptime_millis: u32) {
        self.set_monotonic_millis(uptime_millis);
    }
}

impl Clock for ManualClock {
    fn monotonic_millis(&self) -> u32 {
        self.millis.load(Ordering::SeqCst)
    }

    fn epoch_secs(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}
