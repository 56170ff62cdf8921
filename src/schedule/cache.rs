//! Parameter-keyed schedule cache.
//!
//! The cache is the only owner of the live `(parameters, window)` pair.
//! The pair is stored and replaced together under one lock, so a reader can
//! never observe a window that does not correspond to the stored parameters.
//! Rebuilds happen outside the lock (they block on I/O); an epoch counter
//! makes the *last* requested parameters win when rebuilds race, instead of a
//! slow stale rebuild overwriting a newer, faster one.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

use crate::clock;
use crate::error::ScheduleError;
use crate::provider::PrayerTimeSource;
use crate::schedule::{ScheduleParameters, ScheduleWindow, assembler};

struct Stored {
    params: ScheduleParameters,
    window: Arc<ScheduleWindow>,
    /// When this window was stored, so a stale last-known-good view can be
    /// labelled with its age.
    built_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheInner {
    stored: Option<Stored>,
    /// Bumped on every `ensure` that decides to rebuild. A rebuild only
    /// stores its result if the epoch is still the one it was issued under.
    epoch: u64,
}

/// Cache holding the current schedule window and the parameters that
/// produced it.
#[derive(Default)]
pub struct ScheduleCache {
    inner: Mutex<CacheInner>,
}

impl ScheduleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently cached window, if one was ever built.
    pub fn get(&self) -> Option<Arc<ScheduleWindow>> {
        self.inner
            .lock()
            .unwrap()
            .stored
            .as_ref()
            .map(|stored| Arc::clone(&stored.window))
    }

    /// The parameters that produced the cached window.
    pub fn params(&self) -> Option<ScheduleParameters> {
        self.inner
            .lock()
            .unwrap()
            .stored
            .as_ref()
            .map(|stored| stored.params.clone())
    }

    /// When the cached window's data was fetched. Lets a caller label a
    /// stale last-known-good view with its age after a failed refresh.
    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .unwrap()
            .stored
            .as_ref()
            .map(|stored| stored.built_at)
    }

    /// Return the cached window if its parameters equal `params`; otherwise
    /// rebuild, store the `(params, window)` pair atomically, and return the
    /// fresh window.
    ///
    /// Two shortcuts preserve the contract cheaply:
    /// - identical parameters return the cached window with no work;
    /// - parameters that differ only in adjustments or display format are
    ///   re-derived locally from the retained raw instants, with no
    ///   time-source call.
    ///
    /// On assembly failure the previously stored pair is left untouched, so a
    /// failed refresh degrades to last-known-good rather than to nothing. A
    /// rebuild that is overtaken by a newer `ensure` is discarded and
    /// reported as `Superseded`.
    pub fn ensure(
        &self,
        source: &dyn PrayerTimeSource,
        params: &ScheduleParameters,
        days: u32,
    ) -> Result<Arc<ScheduleWindow>, ScheduleError> {
        let my_epoch = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(stored) = &inner.stored {
                if stored.params == *params && stored.window.len() >= days as usize {
                    return Ok(Arc::clone(&stored.window));
                }
                // Local re-derivation path: same fetch inputs, only local
                // transforms changed. The underlying data is unchanged, so
                // built_at carries over. This is still a newer write, so the
                // epoch advances and any rebuild in flight gets discarded.
                if stored.params.same_fetch_inputs(params) && stored.window.len() >= days as usize {
                    let built_at = stored.built_at;
                    let rebuilt = Arc::new(assembler::reapply(&stored.window, params)?);
                    inner.epoch += 1;
                    inner.stored = Some(Stored {
                        params: params.clone(),
                        window: Arc::clone(&rebuilt),
                        built_at,
                    });
                    log_decorated!("Re-applied adjustments to cached schedule");
                    return Ok(rebuilt);
                }
            }
            inner.epoch += 1;
            inner.epoch
        };

        // Network-bound assembly runs without holding the lock
        let window = assembler::assemble(source, params, days)?;

        let mut inner = self.inner.lock().unwrap();
        if inner.epoch != my_epoch {
            // A newer ensure was issued while this rebuild was in flight;
            // its parameters are the desired ones now
            log_pipe!();
            log_warning!("Discarding schedule rebuild that was superseded mid-flight");
            return Err(ScheduleError::Superseded);
        }
        let window = Arc::new(window);
        inner.stored = Some(Stored {
            params: params.clone(),
            window: Arc::clone(&window),
            built_at: clock::now(),
        });
        Ok(window)
    }

    /// Drop the stored pair entirely. The next `ensure` rebuilds from
    /// scratch.
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stored = None;
        inner.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::location::Location;
    use crate::provider::testing::{TableSource, raw_day_at};
    use crate::schedule::{AdjustmentSet, MethodId, Prayer, School, TimeFormat};
    use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};
    use chrono_tz::Tz;

    const TZ: Tz = chrono_tz::Asia::Riyadh;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn pin_clock() {
        let instant = TZ
            .from_local_datetime(&date(1).and_hms_opt(10, 0, 0).unwrap())
            .unwrap()
            .with_timezone(&Utc);
        clock::install_manual_clock(instant);
    }

    fn seeded_source(days: u32) -> TableSource {
        let source = TableSource::new();
        for offset in 0..days {
            source.insert(raw_day_at(
                TZ,
                date(1 + offset),
                [(5, 0), (12, 30), (15, 45), (18, 10), (19, 40)],
            ));
        }
        source
    }

    fn params_for(location: Location) -> ScheduleParameters {
        ScheduleParameters {
            location,
            method: MethodId(4),
            school: School::Standard,
            adjustments: AdjustmentSet::default(),
            time_format: TimeFormat::TwelveHour,
        }
    }

    #[test]
    fn get_is_none_before_first_build() {
        let cache = ScheduleCache::new();
        assert!(cache.get().is_none());
        assert!(cache.params().is_none());
        assert!(cache.built_at().is_none());
    }

    #[test]
    fn equal_params_reuse_the_cached_window() {
        pin_clock();
        let cache = ScheduleCache::new();
        let source = seeded_source(3);
        let params = params_for(Location::new(21.4225, 39.8262));

        let first = cache.ensure(&source, &params, 3).unwrap();
        let calls = source.calls();
        let second = cache.ensure(&source, &params, 3).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), calls);
    }

    #[test]
    fn changed_params_replace_the_pair_atomically() {
        pin_clock();
        let cache = ScheduleCache::new();
        let source = seeded_source(3);
        let params1 = params_for(Location::new(21.4225, 39.8262));
        let mut params2 = params_for(Location::new(21.4225, 39.8262));
        params2.method = MethodId(3);

        cache.ensure(&source, &params1, 2).unwrap();
        cache.ensure(&source, &params2, 2).unwrap();

        // Never a mix: the stored parameters are exactly params2
        assert_eq!(cache.params().unwrap(), params2);
    }

    #[test]
    fn adjustment_only_change_skips_the_time_source() {
        pin_clock();
        let cache = ScheduleCache::new();
        let source = seeded_source(2);
        let params = params_for(Location::new(21.4225, 39.8262));

        cache.ensure(&source, &params, 2).unwrap();
        let calls = source.calls();

        let mut retuned = params.clone();
        retuned.adjustments = AdjustmentSet::new([0, 0, 10, 0, 0]).unwrap();
        let window = cache.ensure(&source, &retuned, 2).unwrap();

        assert_eq!(source.calls(), calls);
        let asr = window.day(0).unwrap().event(Prayer::Asr);
        assert_eq!(asr.instant, asr.raw + TimeDelta::minutes(10));
        assert_eq!(cache.params().unwrap(), retuned);
    }

    #[test]
    fn failed_refresh_keeps_last_known_good() {
        pin_clock();
        let cache = ScheduleCache::new();
        let source = seeded_source(2);
        let params = params_for(Location::new(21.4225, 39.8262));

        let good = cache.ensure(&source, &params, 2).unwrap();

        // New location, but the source has no data for it any more
        source.remove(date(2));
        let mut moved = params.clone();
        moved.location = Location::new(51.5074, -0.1278);

        assert!(matches!(
            cache.ensure(&source, &moved, 2),
            Err(ScheduleError::TimeSourceUnavailable { .. })
        ));

        // Stale but consistent: the previous pair is still served, with its
        // original fetch timestamp intact
        let current = cache.get().unwrap();
        assert!(Arc::ptr_eq(&good, &current));
        assert_eq!(cache.params().unwrap(), params);
        assert_eq!(cache.built_at().unwrap(), clock::now());
    }

    #[test]
    fn invalidate_forces_a_rebuild() {
        pin_clock();
        let cache = ScheduleCache::new();
        let source = seeded_source(2);
        let params = params_for(Location::new(21.4225, 39.8262));

        cache.ensure(&source, &params, 2).unwrap();
        cache.invalidate();
        assert!(cache.get().is_none());

        let calls = source.calls();
        cache.ensure(&source, &params, 2).unwrap();
        assert!(source.calls() > calls);
    }

    use crate::provider::{PrayerTimeSource, RawDayTimes};
    use std::sync::Barrier;

    /// A source that parks the slow fetch at two sync points: `entered`
    /// proves the slow ensure already claimed its epoch, `release` holds
    /// it until the competing ensure has fully finished.
    struct GatedSource {
        inner: TableSource,
        entered: Barrier,
        release: Barrier,
        slow_method: MethodId,
    }

    impl PrayerTimeSource for GatedSource {
        fn fetch_day(
            &self,
            date: NaiveDate,
            location: &Location,
            method: MethodId,
            school: School,
        ) -> anyhow::Result<RawDayTimes> {
            if method == self.slow_method {
                self.entered.wait();
                self.release.wait();
            }
            self.inner.fetch_day(date, location, method, school)
        }
    }

    #[test]
    fn superseded_rebuild_is_discarded() {
        pin_clock();

        let source = GatedSource {
            inner: seeded_source(1),
            entered: Barrier::new(2),
            release: Barrier::new(2),
            slow_method: MethodId(4),
        };
        let cache = ScheduleCache::new();
        let slow_params = params_for(Location::new(21.4225, 39.8262));
        let mut fast_params = slow_params.clone();
        fast_params.method = MethodId(3);

        std::thread::scope(|scope| {
            let slow = scope.spawn(|| cache.ensure(&source, &slow_params, 1));

            // Wait until the slow rebuild is in flight, then overtake it
            source.entered.wait();
            let fast = cache.ensure(&source, &fast_params, 1);
            assert!(fast.is_ok());
            source.release.wait();

            assert!(matches!(
                slow.join().unwrap(),
                Err(ScheduleError::Superseded)
            ));
        });

        // The fast (newer) writer's parameters are what remains stored
        assert_eq!(cache.params().unwrap().method, MethodId(3));
    }

    #[test]
    fn rederivation_supersedes_an_in_flight_rebuild() {
        pin_clock();

        // Seed the cache over the plain inner source first, so the
        // adjustment-only change below can take the reapply shortcut.
        let source = GatedSource {
            inner: seeded_source(1),
            entered: Barrier::new(2),
            release: Barrier::new(2),
            slow_method: MethodId(9),
        };
        let cache = ScheduleCache::new();
        let params = params_for(Location::new(21.4225, 39.8262));
        cache.ensure(&source, &params, 1).unwrap();

        let mut slow_params = params.clone();
        slow_params.method = MethodId(9);
        let mut retuned = params.clone();
        retuned.adjustments = AdjustmentSet::new([0, 0, 10, 0, 0]).unwrap();

        std::thread::scope(|scope| {
            let slow = scope.spawn(|| cache.ensure(&source, &slow_params, 1));

            // With the rebuild parked mid-fetch, apply a local-only change
            source.entered.wait();
            cache.ensure(&source, &retuned, 1).unwrap();
            source.release.wait();

            // The re-derivation is the newer write; the rebuild loses
            assert!(matches!(
                slow.join().unwrap(),
                Err(ScheduleError::Superseded)
            ));
        });

        assert_eq!(cache.params().unwrap(), retuned);
        let asr = cache.get().unwrap().day(0).unwrap().event(Prayer::Asr).instant;
        let raw = cache.get().unwrap().day(0).unwrap().event(Prayer::Asr).raw;
        assert_eq!(asr, raw + TimeDelta::minutes(10));
    }
}
