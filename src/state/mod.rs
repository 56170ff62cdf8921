//! Current/next determination over a schedule window.
//!
//! `evaluate` is a pure function of `(window, now)`: identical inputs always
//! yield identical output, which makes it testable by supplying `now`
//! directly instead of mocking clocks. The window is scanned as one
//! flattened, globally ordered event sequence, so "next" moving from Isha of
//! one day to Fajr of the following day is not a special case; it falls out
//! of ordinary iteration.

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;

use crate::schedule::{Event, ScheduleWindow};

/// The live, derived view of the schedule at one instant.
///
/// `current` is `None` only when `now` precedes everything the window
/// covers. `remaining` is non-negative by construction: the scan uses a
/// strict `>` comparison, so an event at exactly `now` is already "current",
/// never "next".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrayerState {
    pub current: Option<Event>,
    pub next: Event,
    pub remaining: TimeDelta,
}

impl fmt::Display for PrayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.current {
            Some(current) => write!(
                f,
                "{} now, {} in {}",
                current.prayer,
                self.next.prayer,
                format_remaining(self.remaining)
            ),
            None => write!(
                f,
                "{} in {}",
                self.next.prayer,
                format_remaining(self.remaining)
            ),
        }
    }
}

/// Outcome of evaluating a window at an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// The window still has a future event
    Tracking(PrayerState),
    /// `now` is past every event in the window. Not an error: the caller is
    /// expected to install a wider or refreshed window. The state machine
    /// never extrapolates beyond the data it was given.
    Exhausted,
}

impl Evaluation {
    pub fn state(&self) -> Option<&PrayerState> {
        match self {
            Evaluation::Tracking(state) => Some(state),
            Evaluation::Exhausted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Evaluation::Exhausted)
    }
}

/// Evaluate the window at `now`.
///
/// Scans the flattened event sequence for the first event strictly after
/// `now`; its predecessor (across day boundaries) is the current event.
pub fn evaluate(window: &ScheduleWindow, now: DateTime<Utc>) -> Evaluation {
    let mut previous: Option<&Event> = None;
    for event in window.events() {
        if event.instant > now {
            return Evaluation::Tracking(PrayerState {
                current: previous.copied(),
                next: *event,
                remaining: event.instant - now,
            });
        }
        previous = Some(event);
    }
    Evaluation::Exhausted
}

/// Human-readable countdown, e.g. `1h 10m` or `45s`.
pub fn format_remaining(remaining: TimeDelta) -> String {
    let total_secs = remaining.num_seconds().max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
