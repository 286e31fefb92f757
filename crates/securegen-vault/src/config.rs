//! Security settings: stored as plain JSON next to the encrypted records.
//!
//! Nothing in here is secret. The file is read at boot before any key is
//! loaded so iteration counts and session lifetime are known up front.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::Rng;
use securegen_crypto_core::{DEFAULT_EXPORT_ITERATIONS, DEFAULT_LOGIN_ITERATIONS};
use serde::{Deserialize, Serialize};

// ── Session duration ───────────────────────────────────────────────

/// How long a login session survives.
///
/// Serialized as its hour count. Unknown values read back as
/// [`SessionDuration::SixHours`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "u32", into = "u32")]
pub enum SessionDuration {
    /// Valid until power loss; never restored from flash.
    UntilReboot,
    OneHour,
    #[default]
    SixHours,
    TwentyFourHours,
    ThreeDays,
}

impl SessionDuration {
    /// Lifetime in seconds; `0` for [`SessionDuration::UntilReboot`].
    #[must_use]
    pub const fn lifetime_secs(self) -> u64 {
        match self {
            Self::UntilReboot => 0,
            Self::OneHour => 3_600,
            Self::SixHours => 21_600,
            Self::TwentyFourHours => 86_400,
            Self::ThreeDays => 259_200,
        }
    }

    #[must_use]
    pub const fn is_until_reboot(self) -> bool {
        matches!(self, Self::UntilReboot)
    }

    #[must_use]
    pub const fn hours(self) -> u32 {
        match self {
            Self::UntilReboot => 0,
            Self::OneHour => 1,
            Self::SixHours => 6,
            Self::TwentyFourHours => 24,
            Self::ThreeDays => 72,
        }
    }
}

impl From<u32> for SessionDuration {
    fn from(hours: u32) -> Self {
        match hours {
            0 => Self::UntilReboot,
            1 => Self::OneHour,
            24 => Self::TwentyFourHours,
            72 => Self::ThreeDays,
            _ => Self::SixHours,
        }
    }
}

impl From<SessionDuration> for u32 {
    fn from(duration: SessionDuration) -> Self {
        duration.hours()
    }
}

// ── Response timing jitter ─────────────────────────────────────────

/// Random delay added to secure responses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingJitter {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_success_min")]
    pub success_min_ms: u64,
    #[serde(default = "default_success_max")]
    pub success_max_ms: u64,
    #[serde(default = "default_failure_min")]
    pub failure_min_ms: u64,
    #[serde(default = "default_failure_max")]
    pub failure_max_ms: u64,
}

impl Default for TimingJitter {
    fn default() -> Self {
        Self {
            enabled: true,
            success_min_ms: default_success_min(),
            success_max_ms: default_success_max(),
            failure_min_ms: default_failure_min(),
            failure_max_ms: default_failure_max(),
        }
    }
}

impl TimingJitter {
    /// No delays at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay after a successful encryption.
    #[must_use]
    pub fn success_delay(&self) -> Duration {
        self.pick(self.success_min_ms, self.success_max_ms)
    }

    /// Delay on the not-established path.
    #[must_use]
    pub fn failure_delay(&self) -> Duration {
        self.pick(self.failure_min_ms, self.failure_max_ms)
    }

    fn pick(&self, min: u64, max: u64) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let ms = if max > min {
            OsRng.gen_range(min..=max)
        } else {
            min
        };
        Duration::from_millis(ms)
    }
}

const fn default_true() -> bool {
    true
}
const fn default_success_min() -> u64 {
    50
}
const fn default_success_max() -> u64 {
    200
}
const fn default_failure_min() -> u64 {
    100
}
const fn default_failure_max() -> u64 {
    200
}

// ── Top-level config ───────────────────────────────────────────────

/// Device security settings.
///
/// Persisted to `{data_dir}/security.json`. All fields have defaults via
/// [`Default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityConfig {
    /// PBKDF2 iterations for login password hashes.
    #[serde(default = "default_login_iterations")]
    pub login_iterations: u32,

    /// PBKDF2 iterations for password-wrapped bundles and the protected handshake.
    #[serde(default = "default_export_iterations")]
    pub export_iterations: u32,

    /// Capacity of the secure session table.
    #[serde(default = "default_max_sessions")]
    pub max_secure_sessions: usize,

    /// Login session lifetime, in hours on disk.
    #[serde(default)]
    pub session_duration: SessionDuration,

    #[serde(default)]
    pub response_jitter: TimingJitter,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            login_iterations: default_login_iterations(),
            export_iterations: default_export_iterations(),
            max_secure_sessions: default_max_sessions(),
            session_duration: SessionDuration::default(),
            response_jitter: TimingJitter::default(),
        }
    }
}

const fn default_login_iterations() -> u32 {
    DEFAULT_LOGIN_ITERATIONS
}
const fn default_export_iterations() -> u32 {
    DEFAULT_EXPORT_ITERATIONS
}
const fn default_max_sessions() -> usize {
    5
}

// ── File I/O ───────────────────────────────────────────────────────

const CONFIG_FILE: &str = "security.json";

impl SecurityConfig {
    /// Load from `{data_dir}/security.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or contains
    /// invalid JSON. Zero counts are raised to one.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        fs::read_to_string(&path)
            .map_or_else(
                |_| Self::default(),
                |contents| serde_json::from_str(&contents).unwrap_or_default(),
            )
            .sanitized()
    }

    /// Persist to `{data_dir}/security.json` (write `.tmp`, then rename).
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the file
    /// system rejects the write/rename.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let tmp = data_dir.join(".security.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)?;

        Ok(())
    }

    /// Clamp values that would make derivation or the session table unusable.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.login_iterations = self.login_iterations.max(1);
        self.export_iterations = self.export_iterations.max(1);
        self.max_secure_sessions = self.max_secure_sessions.max(1);
        self
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> SecurityConfig {
    SecurityConfig {
        login_iterations: 2,
        export_iterations: 3,
        response_jitter: TimingJitter::disabled(),
        ..SecurityConfig::default()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
