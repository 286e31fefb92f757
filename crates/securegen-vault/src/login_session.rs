//! Persisted login session record and its expiry rules.
//!
//! Two time bases are available:
//!
//! - **Epoch**: used when the record is schema 2+ and carries a plausible
//!   wall-clock creation time. Survives reboots.
//! - **Monotonic**: legacy records, or records written before the clock was
//!   synced. Uptime restarts at boot, so a creation time ahead of "now" means
//!   either a reboot (now < 1 h) or a counter wrap; both count as expired.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current on-flash schema.
pub const SESSION_SCHEMA_VERSION: u32 = 2;

/// Encrypted flash record name.
pub const SESSION_FILE: &str = "session.json.enc";

/// Wall-clock values below this (Sept 2001) mean the clock was never set.
pub const PLAUSIBLE_EPOCH_SECS: u64 = 1_000_000_000;

/// Uptime below this when `now < created` is read as a reboot.
const REBOOT_WINDOW_MILLIS: u32 = 3_600_000;

/// Why a session was judged expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// Wall clock reads before 2001.
    ClockNotSet,
    /// Recorded creation time is after the current wall-clock time.
    CreatedInFuture,
    /// Uptime restarted since the session was created.
    Reboot,
    /// The 32-bit uptime counter wrapped.
    CounterOverflow,
    /// Older than the configured lifetime.
    LifetimeExceeded,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClockNotSet => "clock not set",
            Self::CreatedInFuture => "created in the future",
            Self::Reboot => "device rebooted",
            Self::CounterOverflow => "uptime counter overflow",
            Self::LifetimeExceeded => "lifetime exceeded",
        })
    }
}

/// `{session_id, csrf_token, created_time_millis, created_time_epoch, version}`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentLoginSession {
    pub session_id: String,
    pub csrf_token: String,
    /// Uptime at creation.
    pub created_time_millis: u32,
    /// Wall-clock seconds at creation; 0 or implausible when unsynced.
    #[serde(default)]
    pub created_time_epoch: u64,
    /// Missing in schema 1 records.
    #[serde(default = "legacy_version")]
    pub version: u32,
}

const fn legacy_version() -> u32 {
    1
}

impl PersistentLoginSession {
    #[must_use]
    pub const fn new(
        session_id: String,
        csrf_token: String,
        created_time_millis: u32,
        created_time_epoch: u64,
    ) -> Self {
        Self {
            session_id,
            csrf_token,
            created_time_millis,
            created_time_epoch,
            version: SESSION_SCHEMA_VERSION,
        }
    }

    /// `true` if the epoch time base applies to this record.
    #[must_use]
    pub const fn uses_epoch(&self) -> bool {
        self.version >= SESSION_SCHEMA_VERSION && self.created_time_epoch >= PLAUSIBLE_EPOCH_SECS
    }

    /// Check the record against the current clocks and a lifetime in seconds.
    ///
    /// # Errors
    ///
    /// Returns the [`ExpiryReason`] when the session is no longer valid.
    pub fn check_validity(
        &self,
        now_millis: u32,
        now_epoch: u64,
        lifetime_secs: u64,
    ) -> Result<(), ExpiryReason> {
        if self.uses_epoch() {
            epoch_validity(self.created_time_epoch, now_epoch, lifetime_secs)
        } else {
            monotonic_validity(self.created_time_millis, now_millis, lifetime_secs)
        }
    }
}

impl fmt::Debug for PersistentLoginSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentLoginSession")
            .field("session_id", &"***")
            .field("csrf_token", &"***")
            .field("created_time_millis", &self.created_time_millis)
            .field("created_time_epoch", &self.created_time_epoch)
            .field("version", &self.version)
            .finish()
    }
}

fn epoch_validity(created: u64, now: u64, lifetime_secs: u64) -> Result<(), ExpiryReason> {
    if now < PLAUSIBLE_EPOCH_SECS {
        return Err(ExpiryReason::ClockNotSet);
    }
    let age = now
        .checked_sub(created)
        .ok_or(ExpiryReason::CreatedInFuture)?;
    if age <= lifetime_secs {
        Ok(())
    } else {
        Err(ExpiryReason::LifetimeExceeded)
    }
}

fn monotonic_validity(created: u32, now: u32, lifetime_secs: u64) -> Result<(), ExpiryReason> {
    let Some(elapsed_ms) = now.checked_sub(created) else {
        return Err(if now < REBOOT_WINDOW_MILLIS {
            ExpiryReason::Reboot
        } else {
            ExpiryReason::CounterOverflow
        });
    };
    let age_secs = u64::from(elapsed_ms / 1_000);
    if age_secs <= lifetime_secs {
        Ok(())
    } else {
        Err(ExpiryReason::LifetimeExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIX_HOURS: u64 = 21_600;
    const NOW_EPOCH: u64 = 1_750_000_000;

    fn session(created_millis: u32, created_epoch: u64) -> PersistentLoginSession {
        PersistentLoginSession::new("id".into(), "csrf".into(), created_millis, created_epoch)
    }

    #[test]
    fn epoch_basis_within_lifetime() {
        let s = session(0, NOW_EPOCH - 3_600);
        assert!(s.uses_epoch());
        assert_eq!(s.check_validity(5, NOW_EPOCH, SIX_HOURS), Ok(()));
    }

    #[test]
    fn epoch_basis_boundary_is_inclusive() {
        let s = session(0, NOW_EPOCH - SIX_HOURS);
        assert_eq!(s.check_validity(0, NOW_EPOCH, SIX_HOURS), Ok(()));
        let s = session(0, NOW_EPOCH - SIX_HOURS - 1);
        assert_eq!(
            s.check_validity(0, NOW_EPOCH, SIX_HOURS),
            Err(ExpiryReason::LifetimeExceeded)
        );
    }

    #[test]
    fn epoch_basis_ignores_reboot() {
        // Created late in the previous uptime, checked right after boot.
        let s = session(4_000_000, NOW_EPOCH - 60);
        assert_eq!(s.check_validity(1_000, NOW_EPOCH, SIX_HOURS), Ok(()));
    }

    #[test]
    fn epoch_basis_rejects_unset_clock_and_future() {
        let s = session(0, NOW_EPOCH);
        assert_eq!(
            s.check_validity(0, 12_345, SIX_HOURS),
            Err(ExpiryReason::ClockNotSet)
        );
        assert_eq!(
            s.check_validity(0, NOW_EPOCH - 1, SIX_HOURS),
            Err(ExpiryReason::CreatedInFuture)
        );
    }

    #[test]
    fn implausible_epoch_falls_back_to_monotonic() {
        let s = session(10_000, 500);
        assert!(!s.uses_epoch());
        assert_eq!(s.check_validity(20_000, NOW_EPOCH, SIX_HOURS), Ok(()));
    }

    #[test]
    fn legacy_record_uses_monotonic() {
        let json = r#"{"session_id":"a","csrf_token":"b","created_time_millis":1000}"#;
        let s: PersistentLoginSession = serde_json::from_str(json).unwrap();
        assert_eq!(s.version, 1);
        assert!(!s.uses_epoch());
    }

    #[test]
    fn monotonic_reboot_vs_overflow() {
        let s = session(5_000_000, 0);
        assert_eq!(
            s.check_validity(1_000, NOW_EPOCH, SIX_HOURS),
            Err(ExpiryReason::Reboot)
        );
        assert_eq!(
            s.check_validity(4_000_000, NOW_EPOCH, SIX_HOURS),
            Err(ExpiryReason::CounterOverflow)
        );
    }

    #[test]
    fn monotonic_age_in_whole_seconds() {
        let s = session(1_000, 0);
        let limit_ms = 1_000 + 3_600 * 1_000 + 999;
        assert_eq!(s.check_validity(limit_ms, 0, 3_600), Ok(()));
        assert_eq!(
            s.check_validity(limit_ms + 1, 0, 3_600),
            Err(ExpiryReason::LifetimeExceeded)
        );
    }

    #[test]
    fn serialized_field_names() {
        let json = serde_json::to_value(session(7, NOW_EPOCH)).unwrap();
        assert_eq!(json["created_time_millis"], 7);
        assert_eq!(json["created_time_epoch"], NOW_EPOCH);
        assert_eq!(json["version"], 2);
        assert!(json["session_id"].is_string());
        assert!(json["csrf_token"].is_string());
    }

    #[test]
    fn debug_masks_tokens() {
        let s = PersistentLoginSession::new("deadbeef".into(), "cafebabe".into(), 0, 0);
        let debug = format!("{s:?}");
        assert!(!debug.contains("deadbeef"));
        assert!(!debug.contains("cafebabe"));
    }
}
