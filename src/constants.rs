//! Shared constants for defaults and validation limits.

use std::time::Duration as StdDuration;

/// Number of consecutive days assembled into a schedule window by default.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Upper bound on the window size a single assembly may request.
pub const MAX_WINDOW_DAYS: u32 = 30;

/// Largest per-prayer minute offset accepted in either direction.
pub const MAX_ADJUSTMENT_MINUTES: i32 = 30;

/// Default cadence for countdown re-evaluation.
pub const DEFAULT_TICK_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Bounds for the configurable tick interval, in seconds.
pub const MIN_TICK_INTERVAL_SECS: u64 = 1;
pub const MAX_TICK_INTERVAL_SECS: u64 = 300;

/// Default calculation method identifier (opaque to this engine; the value is
/// forwarded verbatim to the time source).
pub const DEFAULT_METHOD: u8 = 3;
