//! Seam to the external prayer-time source.
//!
//! The engine never performs astronomical calculations. It asks a
//! `PrayerTimeSource` for one day of raw timestamps at a time and treats the
//! answer as opaque truth. Implementations are expected to be idempotent
//! (same inputs, same outputs) — that is what makes the schedule cache sound.
//!
//! The `wire` submodule carries serde types for the JSON timings payload the
//! usual upstream services return. The crate owns no HTTP transport; an
//! embedding application fetches the payload however it likes and converts it
//! with [`RawDayTimes::from_payload`].

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::location::Location;
use crate::schedule::{MethodId, School};

/// One day of unadjusted data from the time source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDayTimes {
    /// The calendar date these times were computed for, in the location's
    /// local calendar
    pub date: NaiveDate,
    /// The five raw prayer instants in canonical order (Fajr..Isha)
    pub times: [DateTime<Utc>; 5],
    /// Dawn twilight marker (after Fajr)
    pub sunrise: DateTime<Utc>,
    /// Dusk marker closing the day (after Isha, possibly past local midnight)
    pub midnight: DateTime<Utc>,
    /// Hijri date label, opaque to the engine
    pub hijri: String,
    /// Qibla bearing in degrees from true north
    pub qibla: f64,
}

/// A per-day prayer-time provider.
///
/// `fetch_day` may block on I/O and may fail; the assembler fans calls out
/// across threads and fails the whole window if any single day fails.
pub trait PrayerTimeSource: Send + Sync {
    fn fetch_day(
        &self,
        date: NaiveDate,
        location: &Location,
        method: MethodId,
        school: School,
    ) -> anyhow::Result<RawDayTimes>;
}

pub mod wire {
    //! Serde types for the upstream JSON timings payload.

    use serde::Deserialize;

    /// One day's payload as returned by the usual timings services.
    #[derive(Debug, Clone, Deserialize)]
    pub struct DayPayload {
        pub timings: Timings,
        pub date: DateInfo,
        pub meta: Meta,
    }

    /// Clock-time strings in the payload's timezone. Some services append a
    /// zone suffix like `"05:02 (+03)"`; parsing tolerates it.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct Timings {
        pub fajr: String,
        pub sunrise: String,
        pub dhuhr: String,
        pub asr: String,
        pub maghrib: String,
        pub isha: String,
        pub midnight: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct DateInfo {
        pub hijri: HijriDate,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct HijriDate {
        pub day: String,
        pub month: HijriMonth,
        pub year: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct HijriMonth {
        pub en: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Meta {
        pub timezone: String,
        #[serde(default)]
        pub qibla_direction: f64,
    }
}

impl RawDayTimes {
    /// Convert a deserialized wire payload into raw day times.
    ///
    /// Clock times are interpreted in the payload's own timezone and
    /// converted to UTC. A midnight marker earlier than Isha is taken to
    /// belong to the following calendar day.
    pub fn from_payload(date: NaiveDate, payload: &wire::DayPayload) -> anyhow::Result<Self> {
        let tz: Tz = payload
            .meta
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown timezone {:?} in payload", payload.meta.timezone))?;

        let resolve = |s: &str| -> anyhow::Result<DateTime<Utc>> {
            let time = parse_clock_time(s)?;
            date.and_time(time)
                .and_local_timezone(tz)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| anyhow::anyhow!("ambiguous local time {s:?} on {date} in {tz}"))
        };

        let times = [
            resolve(&payload.timings.fajr)?,
            resolve(&payload.timings.dhuhr)?,
            resolve(&payload.timings.asr)?,
            resolve(&payload.timings.maghrib)?,
            resolve(&payload.timings.isha)?,
        ];
        let sunrise = resolve(&payload.timings.sunrise)?;
        let mut midnight = resolve(&payload.timings.midnight)?;
        if midnight <= times[4] {
            midnight += TimeDelta::days(1);
        }

        let hijri = format!(
            "{} {} {}",
            payload.date.hijri.day, payload.date.hijri.month.en, payload.date.hijri.year
        );

        Ok(Self {
            date,
            times,
            sunrise,
            midnight,
            hijri,
            qibla: payload.meta.qibla_direction,
        })
    }
}

/// Parse an `"HH:MM"` clock string, tolerating a trailing zone annotation
/// such as `"05:02 (+03)"`.
fn parse_clock_time(s: &str) -> anyhow::Result<NaiveTime> {
    let clock = s.split_whitespace().next().unwrap_or(s);
    NaiveTime::parse_from_str(clock, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M:%S"))
        .map_err(|e| anyhow::anyhow!("invalid clock time {s:?}: {e}"))
}

#[cfg(any(test, feature = "testing-support"))]
pub mod testing {
    //! Deterministic in-memory time source for tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A `PrayerTimeSource` backed by a fixed table of days.
    ///
    /// Fetching a date that is not in the table fails, which doubles as
    /// failure injection for the assembler's all-or-nothing contract. A call
    /// counter lets tests assert that cached windows avoid re-fetching.
    #[derive(Default)]
    pub struct TableSource {
        days: Mutex<HashMap<NaiveDate, RawDayTimes>>,
        calls: AtomicUsize,
    }

    impl TableSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, day: RawDayTimes) {
            self.days.lock().unwrap().insert(day.date, day);
        }

        pub fn remove(&self, date: NaiveDate) {
            self.days.lock().unwrap().remove(&date);
        }

        /// Number of fetch_day calls made so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PrayerTimeSource for TableSource {
        fn fetch_day(
            &self,
            date: NaiveDate,
            _location: &Location,
            _method: MethodId,
            _school: School,
        ) -> anyhow::Result<RawDayTimes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.days
                .lock()
                .unwrap()
                .get(&date)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no timings available for {date}"))
        }
    }

    /// Build a `RawDayTimes` whose five events sit at the given local
    /// `(hour, minute)` pairs in `tz` on `date`.
    pub fn raw_day_at(tz: Tz, date: NaiveDate, times: [(u32, u32); 5]) -> RawDayTimes {
        use chrono::TimeZone;
        let at = |(h, m): (u32, u32)| {
            tz.from_local_datetime(&date.and_hms_opt(h, m, 0).unwrap())
                .unwrap()
                .with_timezone(&Utc)
        };
        let times = [
            at(times[0]),
            at(times[1]),
            at(times[2]),
            at(times[3]),
            at(times[4]),
        ];
        RawDayTimes {
            date,
            times,
            sunrise: times[0] + TimeDelta::minutes(80),
            midnight: times[4] + TimeDelta::hours(4),
            hijri: String::from("15 Sha'ban 1446"),
            qibla: 136.2,
        }
    }
}
