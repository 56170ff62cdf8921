//! Schedule data model: prayers, events, day schedules, and windows.
//!
//! Everything in this module is immutable once constructed. A
//! `ScheduleWindow` is built in one shot by the assembler, validated against
//! its invariants at construction, and then shared behind an `Arc`; a
//! parameter change always produces a new window instead of mutating the old
//! one. Storing full `DateTime<Utc>` instants (rather than naive times of
//! day) means comparisons automatically handle day boundaries, so the state
//! machine needs no midnight special case.

pub mod adjust;
pub mod assembler;
pub mod cache;

pub use adjust::AdjustmentSet;
pub use cache::ScheduleCache;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScheduleError;
use crate::location::Location;

/// One of the five canonical daily prayers, in fixed ordinal order.
///
/// The ordinal (0..4) is what makes ordering and day rollover unambiguous:
/// `events[4]` of one day is always followed by `events[0]` of the next.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prayer {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    /// All five prayers in canonical order.
    pub const ALL: [Prayer; 5] = [
        Prayer::Fajr,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    /// Fixed position within the day (0..4).
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Prayer> {
        Prayer::ALL.get(ordinal).copied()
    }

    /// Canonical transliterated name.
    pub fn name(&self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }

    /// Arabic display label.
    pub fn label(&self) -> &'static str {
        match self {
            Prayer::Fajr => "الفجر",
            Prayer::Dhuhr => "الظهر",
            Prayer::Asr => "العصر",
            Prayer::Maghrib => "المغرب",
            Prayer::Isha => "العشاء",
        }
    }

    /// The prayer that follows this one, wrapping Isha back to Fajr.
    pub fn next(&self) -> Prayer {
        Prayer::ALL[(self.ordinal() + 1) % 5]
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single scheduled occurrence of a prayer.
///
/// `raw` is the unadjusted instant exactly as the time source returned it;
/// `instant` is `raw` plus the configured per-prayer minute offset. The raw
/// instant is retained so a changed adjustment set can be re-applied locally
/// without re-fetching and without compounding previous offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub prayer: Prayer,
    pub raw: DateTime<Utc>,
    pub instant: DateTime<Utc>,
}

impl Event {
    /// An event with no adjustment applied.
    pub fn unadjusted(prayer: Prayer, raw: DateTime<Utc>) -> Self {
        Self {
            prayer,
            raw,
            instant: raw,
        }
    }
}

/// One calendar day's schedule: the five ordered prayer events plus the
/// auxiliary fields the time source reports alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySchedule {
    /// Calendar date in the schedule's location timezone
    pub date: NaiveDate,
    /// Non-Gregorian (Hijri) date label, opaque to the engine beyond display
    pub hijri: String,
    /// The five prayer events in canonical order, strictly increasing in time
    pub events: [Event; 5],
    /// Dawn twilight marker; falls after Fajr as fetched
    pub sunrise: DateTime<Utc>,
    /// Dusk marker closing the day; falls after Isha as fetched
    pub midnight: DateTime<Utc>,
    /// Qibla bearing in degrees from true north (0..360)
    pub qibla: f64,
}

impl DaySchedule {
    /// Validate the per-day invariants: events strictly increasing in
    /// canonical order, with the auxiliary markers bracketing the first and
    /// last fetched instants. The marker checks compare against `raw`, not
    /// `instant`: a user offset pushing adjusted Fajr past sunrise is a
    /// permitted configuration, not bad source data.
    pub fn check_invariants(&self) -> Result<(), ScheduleError> {
        for pair in self.events.windows(2) {
            if pair[0].instant >= pair[1].instant {
                return Err(ScheduleError::InvalidWindow {
                    reason: format!(
                        "{}: {} at {} is not before {} at {}",
                        self.date, pair[0].prayer, pair[0].instant, pair[1].prayer, pair[1].instant
                    ),
                });
            }
        }
        if self.events[0].raw >= self.sunrise {
            return Err(ScheduleError::InvalidWindow {
                reason: format!("{}: sunrise marker does not follow Fajr", self.date),
            });
        }
        if self.events[4].raw >= self.midnight {
            return Err(ScheduleError::InvalidWindow {
                reason: format!("{}: midnight marker does not follow Isha", self.date),
            });
        }
        if !(0.0..360.0).contains(&self.qibla) {
            return Err(ScheduleError::InvalidWindow {
                reason: format!("{}: qibla bearing {} out of range", self.date, self.qibla),
            });
        }
        Ok(())
    }

    pub fn event(&self, prayer: Prayer) -> &Event {
        &self.events[prayer.ordinal()]
    }
}

/// An ordered, immutable sequence of consecutive day schedules.
///
/// Offset 0 is "today" in the location's local calendar at assembly time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleWindow {
    /// The timezone of the schedule's location
    pub timezone: Tz,
    days: Vec<DaySchedule>,
}

impl ScheduleWindow {
    /// Build a window, enforcing that days are consecutive and each day is
    /// internally consistent.
    pub fn new(timezone: Tz, days: Vec<DaySchedule>) -> Result<Self, ScheduleError> {
        if days.is_empty() {
            return Err(ScheduleError::InvalidWindow {
                reason: "window must cover at least one day".into(),
            });
        }
        for day in &days {
            day.check_invariants()?;
        }
        for pair in days.windows(2) {
            if pair[0].date + TimeDelta::days(1) != pair[1].date {
                return Err(ScheduleError::InvalidWindow {
                    reason: format!("{} is not followed by the next day ({})", pair[0].date, pair[1].date),
                });
            }
            // Days must also be increasing in time, not just in date
            if pair[0].events[4].instant >= pair[1].events[0].instant {
                return Err(ScheduleError::InvalidWindow {
                    reason: format!(
                        "Isha of {} does not precede Fajr of {}",
                        pair[0].date, pair[1].date
                    ),
                });
            }
        }
        Ok(Self { timezone, days })
    }

    pub fn days(&self) -> &[DaySchedule] {
        &self.days
    }

    pub fn day(&self, offset: usize) -> Option<&DaySchedule> {
        self.days.get(offset)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.days[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.days[self.days.len() - 1].date
    }

    /// The flattened, globally ordered event sequence across all days.
    ///
    /// This is the sequence the state machine scans; flattening is what makes
    /// day rollover fall out of ordinary iteration instead of needing a
    /// "look at tomorrow" branch.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.days.iter().flat_map(|day| day.events.iter())
    }
}

/// Opaque calculation-method identifier, forwarded verbatim to the time
/// source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodId(pub u8);

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method {}", self.0)
    }
}

/// Juristic school selecting the Asr shadow convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum School {
    Standard,
    Hanafi,
}

impl School {
    pub fn as_str(&self) -> &'static str {
        match self {
            School::Standard => "standard",
            School::Hanafi => "hanafi",
        }
    }
}

/// Time display format for rendering event instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    TwelveHour,
    TwentyFourHour,
}

impl TimeFormat {
    /// Render an instant in the given timezone according to this format.
    pub fn render(&self, instant: DateTime<Utc>, tz: Tz) -> String {
        let local = instant.with_timezone(&tz);
        match self {
            TimeFormat::TwelveHour => local.format("%-I:%M %p").to_string(),
            TimeFormat::TwentyFourHour => local.format("%H:%M").to_string(),
        }
    }
}

/// The full tuple of inputs that uniquely determines a schedule window.
///
/// Equality of two parameter values is the sole cache-invalidation trigger:
/// same parameters means the cached window is reused, different parameters
/// means a rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleParameters {
    pub location: Location,
    pub method: MethodId,
    pub school: School,
    pub adjustments: AdjustmentSet,
    pub time_format: TimeFormat,
}

impl ScheduleParameters {
    /// True when `other` differs only in fields that can be re-derived from
    /// already-fetched raw instants (adjustments, display format). Anything
    /// that changes what the time source would return forces a re-fetch.
    pub fn same_fetch_inputs(&self, other: &ScheduleParameters) -> bool {
        self.location == other.location && self.method == other.method && self.school == other.school
    }
}
