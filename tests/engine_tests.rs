//! End-to-end tests driving the engine facade, cache, and ticker together
//! against a deterministic time source and a manually stepped clock.
//!
//! The global clock is process-wide, so every test that repositions it runs
//! serially.

use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use miqat::clock;
use miqat::config::Settings;
use miqat::provider::testing::{TableSource, raw_day_at};
use miqat::schedule::{ScheduleCache, ScheduleParameters};
use miqat::ticker::CountdownTicker;
use miqat::{AdjustmentSet, Location, MethodId, Miqat, Prayer, School, StateUpdate, TimeFormat};

const TZ: Tz = chrono_tz::Asia::Riyadh;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn local(d: u32, h: u32, m: u32) -> chrono::DateTime<Utc> {
    TZ.from_local_datetime(&date(d).and_hms_opt(h, m, 0).unwrap())
        .unwrap()
        .with_timezone(&Utc)
}

fn seeded_source(days: u32) -> Arc<TableSource> {
    let source = Arc::new(TableSource::new());
    for offset in 0..days {
        source.insert(raw_day_at(
            TZ,
            date(1 + offset),
            [(5, 0), (12, 30), (15, 45), (18, 10), (19, 40)],
        ));
    }
    source
}

fn makkah_settings() -> Settings {
    Settings {
        latitude: Some(21.4225),
        longitude: Some(39.8262),
        location_name: Some("Makkah".into()),
        method: Some(4),
        window_days: Some(2),
        ..Default::default()
    }
}

/// Poll `latest` until `predicate` holds or the deadline passes. Window
/// changes reach the ticker through a poke, so publications are
/// asynchronous relative to the caller.
fn wait_until(
    latest: impl Fn() -> Option<StateUpdate>,
    predicate: impl Fn(&StateUpdate) -> bool,
) -> StateUpdate {
    let deadline = std::time::Instant::now() + StdDuration::from_secs(2);
    loop {
        if let Some(update) = latest() {
            if predicate(&update) {
                return update;
            }
        }
        if std::time::Instant::now() > deadline {
            panic!("ticker never reached the expected state");
        }
        std::thread::sleep(StdDuration::from_millis(5));
    }
}

#[test]
#[serial]
fn startup_builds_a_window_and_publishes_state() {
    clock::install_manual_clock(local(1, 10, 0));
    let source = seeded_source(2);
    let engine = Miqat::new(source.clone(), makkah_settings());

    engine.start().unwrap();

    let window = engine.window().unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window.first_date(), date(1));

    // 10:00 sits between Fajr and Dhuhr
    let update = engine.state().unwrap();
    let state = update.state().unwrap();
    assert_eq!(state.current.unwrap().prayer, Prayer::Fajr);
    assert_eq!(state.next.prayer, Prayer::Dhuhr);
    assert_eq!(state.remaining, TimeDelta::hours(2) + TimeDelta::minutes(30));

    engine.stop();
}

#[test]
#[serial]
fn start_fails_without_a_location() {
    clock::install_manual_clock(local(1, 10, 0));
    let source = seeded_source(2);
    let mut settings = makkah_settings();
    settings.latitude = None;
    settings.longitude = None;

    let engine = Miqat::new(source, settings);
    assert!(engine.start().is_err());
    assert!(engine.window().is_none());
}

#[test]
#[serial]
fn parameter_change_rebuilds_and_refreshes_immediately() {
    clock::install_manual_clock(local(1, 10, 0));
    let source = seeded_source(2);
    let engine = Miqat::new(source.clone(), makkah_settings());
    engine.start().unwrap();
    let calls_after_start = source.calls();

    // Method change requires a re-fetch
    engine.update_parameters(|s| s.method = Some(3)).unwrap();
    assert!(source.calls() > calls_after_start);
    assert_eq!(engine.settings().method, Some(3));

    // The published state reflects the new window without waiting a cadence
    let update = engine.state().unwrap();
    assert!(update.state().is_some());

    engine.stop();
}

#[test]
#[serial]
fn adjustment_change_is_local_and_shifts_the_published_instant() {
    clock::install_manual_clock(local(1, 10, 0));
    let source = seeded_source(2);
    let engine = Miqat::new(source.clone(), makkah_settings());
    engine.start().unwrap();
    let calls_after_start = source.calls();

    engine.update_parameters(|s| s.adjust_dhuhr = Some(10)).unwrap();

    // Re-derived from retained raw instants, not re-fetched
    assert_eq!(source.calls(), calls_after_start);
    let update = wait_until(
        || engine.state(),
        |u| u.state().is_some_and(|s| s.next.instant == local(1, 12, 40)),
    );
    assert_eq!(update.state().unwrap().next.prayer, Prayer::Dhuhr);

    engine.stop();
}

#[test]
#[serial]
fn invalid_update_is_rejected_and_nothing_changes() {
    clock::install_manual_clock(local(1, 10, 0));
    let source = seeded_source(2);
    let engine = Miqat::new(source, makkah_settings());
    engine.start().unwrap();
    let before = engine.settings();

    assert!(engine.update_parameters(|s| s.adjust_isha = Some(45)).is_err());
    assert_eq!(engine.settings(), before);

    engine.stop();
}

#[test]
#[serial]
fn failed_refresh_degrades_to_last_known_good() {
    clock::install_manual_clock(local(1, 10, 0));
    let source = seeded_source(2);
    let engine = Miqat::new(source.clone(), makkah_settings());
    engine.start().unwrap();
    let good_window = engine.window().unwrap();

    // The source loses a day, so the rebuild for new parameters must fail
    source.remove(date(2));
    assert!(engine.update_parameters(|s| s.method = Some(2)).is_err());

    // Previous settings, window, and state all remain in effect, and the
    // stale view can still be labelled with its fetch time
    assert_eq!(engine.settings().method, Some(4));
    assert!(Arc::ptr_eq(&good_window, &engine.window().unwrap()));
    assert!(engine.state().unwrap().state().is_some());
    assert!(engine.last_refreshed().is_some());

    engine.stop();
}

#[test]
#[serial]
fn rollover_and_exhaustion_flow_through_the_ticker() {
    let manual = clock::install_manual_clock(local(1, 10, 0));
    let source = seeded_source(2);
    let cache = Arc::new(ScheduleCache::new());
    let params = ScheduleParameters {
        location: Location::new(21.4225, 39.8262),
        method: MethodId(4),
        school: School::Standard,
        adjustments: AdjustmentSet::default(),
        time_format: TimeFormat::TwelveHour,
    };
    cache.ensure(source.as_ref(), &params, 2).unwrap();

    let ticker = CountdownTicker::new(cache);
    ticker.start(StdDuration::from_millis(10));

    // Late night on day one: current is Isha, next rolls into day two
    manual.set(local(1, 23, 50));
    let update = wait_until(
        || ticker.latest(),
        |u| u.state().is_some_and(|s| s.next.prayer == Prayer::Fajr),
    );
    let state = update.state().unwrap();
    assert_eq!(state.current.unwrap().prayer, Prayer::Isha);
    assert_eq!(state.current.unwrap().instant, local(1, 19, 40));
    assert_eq!(state.next.instant, local(2, 5, 0));
    assert_eq!(state.remaining, TimeDelta::hours(5) + TimeDelta::minutes(10));

    // Past the final event of the window: exhaustion is published as a
    // value and the ticker keeps running
    manual.set(local(2, 23, 0));
    wait_until(|| ticker.latest(), |u| *u == StateUpdate::Exhausted);
    assert!(ticker.is_running());

    ticker.stop();
}

#[test]
#[serial]
fn subscribers_observe_every_publication() {
    clock::install_manual_clock(local(1, 10, 0));
    let source = seeded_source(2);
    let engine = Miqat::new(source, makkah_settings());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = engine.subscribe(move |update| sink.lock().unwrap().push(*update));

    engine.start().unwrap();
    assert!(!seen.lock().unwrap().is_empty());

    // No further callbacks after unsubscribing
    engine.unsubscribe(id);
    let count = seen.lock().unwrap().len();
    engine.update_parameters(|s| s.adjust_fajr = Some(5)).unwrap();
    std::thread::sleep(StdDuration::from_millis(50));
    assert_eq!(seen.lock().unwrap().len(), count);

    engine.stop();
}
