//! Watchdog feeding around long blocking operations.
//!
//! The device runs a hardware task watchdog with a timeout of roughly five
//! seconds. PBKDF2 with thousands of iterations and P-256 scalar
//! multiplication can approach that budget, so every call site feeds the
//! watchdog immediately before and after such work.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A watchdog that must be fed periodically.
pub trait Watchdog: Send + Sync {
    /// Reset the watchdog timer.
    fn feed(&self);
}

/// Watchdog for hosts without one.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopWatchdog;

impl Watchdog for NoopWatchdog {
    fn feed(&self) {}
}

/// Watchdog that only counts feeds. Lets host builds and tests check that
/// long operations are bracketed.
#[derive(Debug, Default)]
pub struct CountingWatchdog {
    feeds: AtomicUsize,
}

impl CountingWatchdog {
    /// Number of feeds so far.
    #[must_use]
    pub fn feeds(&self) -> usize {
        self.feeds.load(Ordering::SeqCst)
    }
}

impl Watchdog for CountingWatchdog {
    fn feed(&self) {
        self.feeds.fetch_add(1, Ordering::SeqCst);
    }
}

/// Run `op` with the watchdog fed immediately before and after.
pub fn guarded<T>(watchdog: &dyn Watchdog, op: impl FnOnce() -> T) -> T {
    watchdog.feed();
    let out = op();
    watchdog.feed();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_feeds_before_and_after() {
        let dog = CountingWatchdog::default();
        let value = guarded(&dog, || {
            assert_eq!(dog.feeds(), 1);
            7
        });
        assert_eq!(value, 7);
        assert_eq!(dog.feeds(), 2);
    }
}
