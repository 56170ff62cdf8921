//! Failure taxonomy for schedule assembly and caching.
//!
//! `ScheduleExhausted` is deliberately absent: a window whose last event has
//! elapsed is a signal published by the ticker as a state value, not a
//! failure of any operation.

use chrono::NaiveDate;
use thiserror::Error;

use crate::schedule::Prayer;

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Assembly was requested without a resolved location. Recoverable by the
    /// caller supplying coordinates; never retried automatically.
    #[error("no resolved location; coordinates are required before a schedule can be built")]
    LocationMissing,

    /// A per-day fetch failed. The whole assembly fails atomically and the
    /// cache keeps serving its previous window.
    #[error("time source failed for {date}")]
    TimeSourceUnavailable {
        date: NaiveDate,
        #[source]
        source: anyhow::Error,
    },

    /// An adjustment set would push two adjacent events out of canonical
    /// order. Surfaced as a validation failure, never applied.
    #[error("{offset:+} min adjustment moves {prayer} past {following}; events must stay in canonical order")]
    InvalidAdjustment {
        prayer: Prayer,
        following: Prayer,
        offset: i32,
    },

    /// The requested parameters were replaced by a newer `ensure` while this
    /// rebuild was in flight; its result was discarded so the newer writer
    /// wins deterministically.
    #[error("schedule parameters changed while the rebuild was in flight")]
    Superseded,

    /// The time source handed back data that cannot form a consistent window
    /// (events out of order, gap between days, markers not bracketing the
    /// day). The window is rejected rather than published inconsistent.
    #[error("inconsistent schedule data: {reason}")]
    InvalidWindow { reason: String },
}
