//! Time sources for the agent.
//!
//! All timing in the pipeline flows through the [`Clock`] trait so that
//! detectors, the queue's flush policy, and session-timeout logic can be
//! driven deterministically in tests. Hosts normally pass [`SystemClock`];
//! tests use [`ManualClock`] and advance it explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of wall-clock and monotonic time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn unix_ms(&self) -> i64;

    /// Monotonic seconds since an arbitrary fixed origin.
    ///
    /// Used for elapsed-time arithmetic (flush intervals, jank episode
    /// durations, dedupe windows); never compared against `unix_ms`.
    fn monotonic_secs(&self) -> f64;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Real time: `SystemTime` for timestamps, `Instant` for elapsed time.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn unix_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as i64)
    }

    fn monotonic_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Deterministic clock for tests; advanced explicitly.
///
/// Monotonic time is stored as microseconds so fractional-second advances
/// stay exact.
pub struct ManualClock {
    unix_ms: AtomicU64,
    monotonic_us: AtomicU64,
}

impl ManualClock {
    /// Create a manual clock starting at the given epoch milliseconds.
    #[must_use]
    pub fn new(start_unix_ms: i64) -> Self {
        Self {
            unix_ms: AtomicU64::new(start_unix_ms.max(0) as u64),
            monotonic_us: AtomicU64::new(0),
        }
    }

    /// Advance both wall-clock and monotonic time by `secs`.
    pub fn advance_secs(&self, secs: f64) {
        let us = (secs * 1_000_000.0) as u64;
        self.monotonic_us.fetch_add(us, Ordering::SeqCst);
        self.unix_ms.fetch_add(us / 1000, Ordering::SeqCst);
    }

    /// Advance both clocks by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.monotonic_us.fetch_add(ms * 1000, Ordering::SeqCst);
        self.unix_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_ms(&self) -> i64 {
        self.unix_ms.load(Ordering::SeqCst) as i64
    }

    fn monotonic_secs(&self) -> f64 {
        self.monotonic_us.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic_secs();
        let b = clock.monotonic_secs();
        assert!(b >= a);
        assert!(clock.unix_ms() > 1_500_000_000_000);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000_000);
        assert_eq!(clock.unix_ms(), 1_000_000);
        assert!((clock.monotonic_secs() - 0.0).abs() < f64::EPSILON);

        clock.advance_secs(1.5);
        assert_eq!(clock.unix_ms(), 1_001_500);
        assert!((clock.monotonic_secs() - 1.5).abs() < 1e-9);

        clock.advance_ms(250);
        assert_eq!(clock.unix_ms(), 1_001_750);
        assert!((clock.monotonic_secs() - 1.75).abs() < 1e-9);
    }
}
