//! Per-prayer minute adjustments.
//!
//! An `AdjustmentSet` is five signed minute offsets, one per prayer ordinal.
//! Applying a set is a pure transform of a day's *raw* instants: it never
//! reads previously adjusted values, so applying the same set twice, or
//! switching between sets, can never compound offsets. A set that would push
//! two adjacent events out of canonical order is rejected outright; the
//! engine never reorders or clamps canonical events.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_ADJUSTMENT_MINUTES;
use crate::error::ScheduleError;
use crate::schedule::{DaySchedule, Event, Prayer};

/// Five signed minute offsets, indexed by prayer ordinal. Default is all
/// zeros. Each offset must stay within ±`MAX_ADJUSTMENT_MINUTES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdjustmentSet {
    offsets: [i32; 5],
}

impl AdjustmentSet {
    /// Build a set from explicit per-prayer offsets, rejecting any value
    /// outside the allowed range.
    pub fn new(offsets: [i32; 5]) -> anyhow::Result<Self> {
        for (ordinal, &offset) in offsets.iter().enumerate() {
            if offset.abs() > MAX_ADJUSTMENT_MINUTES {
                let prayer = Prayer::from_ordinal(ordinal).unwrap();
                anyhow::bail!(
                    "{prayer} adjustment {offset:+} min exceeds the ±{MAX_ADJUSTMENT_MINUTES} min range"
                );
            }
        }
        Ok(Self { offsets })
    }

    /// Build a set without range checking. Used by tests that deliberately
    /// construct invalid configurations; `apply` still enforces ordering.
    pub fn new_unchecked(offsets: [i32; 5]) -> Self {
        Self { offsets }
    }

    pub fn offset(&self, prayer: Prayer) -> i32 {
        self.offsets[prayer.ordinal()]
    }

    pub fn set_offset(&mut self, prayer: Prayer, minutes: i32) {
        self.offsets[prayer.ordinal()] = minutes;
    }

    pub fn offsets(&self) -> [i32; 5] {
        self.offsets
    }

    pub fn is_zero(&self) -> bool {
        self.offsets.iter().all(|&o| o == 0)
    }

    /// Apply this set to a day's raw instants, producing a new day schedule.
    ///
    /// Idempotent by construction: only `Event::raw` is read, so the input
    /// day may itself already carry adjusted instants from a previous set.
    /// Fails with `InvalidAdjustment` if any two adjacent events would end up
    /// in non-increasing order.
    pub fn apply(&self, day: &DaySchedule) -> Result<DaySchedule, ScheduleError> {
        let mut events = day.events;
        for event in &mut events {
            *event = Event {
                prayer: event.prayer,
                raw: event.raw,
                instant: event.raw + TimeDelta::minutes(self.offset(event.prayer) as i64),
            };
        }

        for pair in events.windows(2) {
            if pair[0].instant >= pair[1].instant {
                return Err(ScheduleError::InvalidAdjustment {
                    prayer: pair[0].prayer,
                    following: pair[1].prayer,
                    offset: self.offset(pair[0].prayer),
                });
            }
        }

        Ok(DaySchedule {
            date: day.date,
            hijri: day.hijri.clone(),
            events,
            sunrise: day.sunrise,
            midnight: day.midnight,
            qibla: day.qibla,
        })
    }
}
