//! Multi-day schedule assembly.
//!
//! The assembler turns `(parameters, days)` into a validated
//! `ScheduleWindow`. Target dates are computed in the *location's* calendar
//! (offset 0 is today at the coordinates, which matters whenever the process
//! runs in a different timezone than the location it is scheduling for). The
//! per-day fetches are independent, so they fan out across scoped threads and
//! are only combined at the end; if any single day fails, the whole assembly
//! fails and nothing partially built ever escapes.

use chrono::TimeDelta;

use crate::clock;
use crate::error::ScheduleError;
use crate::provider::{PrayerTimeSource, RawDayTimes};
use crate::schedule::{DaySchedule, Event, Prayer, ScheduleParameters, ScheduleWindow};

/// Assemble a window of `days` consecutive day schedules starting today.
pub fn assemble(
    source: &dyn PrayerTimeSource,
    params: &ScheduleParameters,
    days: u32,
) -> Result<ScheduleWindow, ScheduleError> {
    if days == 0 {
        return Err(ScheduleError::InvalidWindow {
            reason: "a window must cover at least one day".into(),
        });
    }
    if !params.location.is_valid() {
        return Err(ScheduleError::LocationMissing);
    }

    let tz = params.location.timezone();
    let today = clock::now().with_timezone(&tz).date_naive();

    log_block_start!(
        "Building {days}-day schedule for {} ({}, {})",
        params.location.describe(),
        params.method,
        params.school.as_str()
    );

    // Fan out one fetch per day; results are independent and joined in
    // request order, so the collected vector is already date-sorted.
    let fetched: Vec<Result<RawDayTimes, ScheduleError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..days)
            .map(|offset| {
                let date = today + TimeDelta::days(offset as i64);
                scope.spawn(move || {
                    source
                        .fetch_day(date, &params.location, params.method, params.school)
                        .map_err(|e| ScheduleError::TimeSourceUnavailable { date, source: e })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("day fetch thread panicked"))
            .collect()
    });

    let mut day_schedules = Vec::with_capacity(days as usize);
    for result in fetched {
        let raw = result?;
        let day = build_day(&raw, params)?;
        day_schedules.push(day);
    }

    let window = ScheduleWindow::new(tz, day_schedules)?;
    log_decorated!(
        "Schedule ready: {} through {}",
        window.first_date(),
        window.last_date()
    );
    Ok(window)
}

/// Re-apply a (possibly different) adjustment set to an already-fetched
/// window. This is a pure local transform over the retained raw instants; no
/// time-source call is made.
pub fn reapply(
    window: &ScheduleWindow,
    params: &ScheduleParameters,
) -> Result<ScheduleWindow, ScheduleError> {
    let days = window
        .days()
        .iter()
        .map(|day| params.adjustments.apply(day))
        .collect::<Result<Vec<_>, _>>()?;
    ScheduleWindow::new(window.timezone, days)
}

fn build_day(raw: &RawDayTimes, params: &ScheduleParameters) -> Result<DaySchedule, ScheduleError> {
    let events = [
        Event::unadjusted(Prayer::Fajr, raw.times[0]),
        Event::unadjusted(Prayer::Dhuhr, raw.times[1]),
        Event::unadjusted(Prayer::Asr, raw.times[2]),
        Event::unadjusted(Prayer::Maghrib, raw.times[3]),
        Event::unadjusted(Prayer::Isha, raw.times[4]),
    ];
    let day = DaySchedule {
        date: raw.date,
        hijri: raw.hijri.clone(),
        events,
        sunrise: raw.sunrise,
        midnight: raw.midnight,
        qibla: raw.qibla,
    };
    params.adjustments.apply(&day)
}
