//! Clock abstraction for supporting both real and manually driven time.
//!
//! This module provides a trait-based abstraction that allows the engine to
//! run against either the system clock or a manually stepped clock for tests.
//! The manual clock is what makes the countdown ticker testable: tests step
//! time forward explicitly and wake any blocked sleeps instead of waiting for
//! wall-clock time to pass.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration as StdDuration;

/// Global clock instance, defaults to SystemClock
static CLOCK: OnceCell<Arc<dyn Clock>> = OnceCell::new();

/// Trait for abstracting time operations
pub trait Clock: Send + Sync {
    /// Get the current instant
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for the specified duration (or until manually woken)
    fn sleep(&self, duration: StdDuration);

    /// Check if this clock is manually driven
    fn is_manual(&self) -> bool;
}

/// Real-time implementation that uses the actual system clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_manual(&self) -> bool {
        false
    }
}

/// Manually driven clock for deterministic tests.
///
/// Time only moves when `advance` or `set` is called. Any thread blocked in
/// `sleep` is woken on every step so it can re-read the clock; callers that
/// sleep in a loop (the ticker) observe the new instant immediately.
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    wake: Condvar,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
            wake: Condvar::new(),
        }
    }

    /// Move the clock forward by `delta` and wake all sleepers.
    pub fn advance(&self, delta: chrono::TimeDelta) {
        let mut guard = self.current.lock().unwrap();
        *guard += delta;
        self.wake.notify_all();
    }

    /// Jump the clock to an absolute instant and wake all sleepers.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.current.lock().unwrap();
        *guard = instant;
        self.wake.notify_all();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }

    fn sleep(&self, duration: StdDuration) {
        // Block until the clock has advanced past the wake-up instant.
        // Each step notifies, so the loop re-checks against manual time.
        let deadline = chrono::TimeDelta::from_std(duration)
            .ok()
            .and_then(|delta| self.now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut guard = self.current.lock().unwrap();
        while *guard < deadline {
            guard = self.wake.wait(guard).unwrap();
        }
    }

    fn is_manual(&self) -> bool {
        true
    }
}

/// Initialize the global clock (call once at startup or test setup)
pub fn init_clock(clock: Arc<dyn Clock>) {
    CLOCK.set(clock).ok();
}

/// Check if the clock has been initialized
pub fn is_initialized() -> bool {
    CLOCK.get().is_some()
}

/// Get the current instant from the global clock
pub fn now() -> DateTime<Utc> {
    CLOCK.get_or_init(|| Arc::new(SystemClock)).now()
}

/// Sleep for the specified duration using the global clock
pub fn sleep(duration: StdDuration) {
    CLOCK.get_or_init(|| Arc::new(SystemClock)).sleep(duration)
}

/// Check if the global clock is manually driven
pub fn is_manual() -> bool {
    CLOCK.get_or_init(|| Arc::new(SystemClock)).is_manual()
}

/// Install (or fetch the already-installed) process-wide manual clock and
/// position it at `start`.
///
/// The global clock can only be set once per process, so every test that
/// needs clock control shares the same `ManualClock` instance. Tests that
/// move the clock must not run concurrently with each other.
#[cfg(any(test, feature = "testing-support"))]
pub fn install_manual_clock(start: DateTime<Utc>) -> Arc<ManualClock> {
    static MANUAL: OnceCell<Arc<ManualClock>> = OnceCell::new();
    let manual = MANUAL.get_or_init(|| Arc::new(ManualClock::new(start)));
    let as_clock: Arc<dyn Clock> = manual.clone();
    init_clock(as_clock);
    manual.set(start);
    manual.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_reports_set_instant() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::TimeDelta::minutes(30));
        assert_eq!(clock.now(), start + chrono::TimeDelta::minutes(30));
    }

    #[test]
    fn installed_manual_clock_drives_the_global_accessors() {
        let instant = chrono_tz::Asia::Riyadh
            .with_ymd_and_hms(2025, 3, 1, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        let manual = install_manual_clock(instant);
        assert!(is_initialized());
        assert!(is_manual());
        assert_eq!(now(), instant);

        // Installing again returns the same shared clock, repositioned
        let again = install_manual_clock(instant);
        assert!(Arc::ptr_eq(&manual, &again));
        assert_eq!(now(), instant);
    }

    #[test]
    fn manual_clock_sleep_unblocks_on_advance() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));

        let sleeper = Arc::clone(&clock);
        let handle = std::thread::spawn(move || {
            sleeper.sleep(StdDuration::from_secs(60));
        });

        // Give the sleeper a moment to block, then step past its deadline
        std::thread::sleep(StdDuration::from_millis(20));
        clock.advance(chrono::TimeDelta::seconds(61));
        handle.join().unwrap();
    }
}
