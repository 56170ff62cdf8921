//! # Miqat Library
//!
//! Prayer-time scheduling engine.
//!
//! Given a resolved location and a set of calculation preferences, miqat
//! assembles an ordered multi-day table of the five daily prayer events,
//! continuously determines which event is active and which comes next, and
//! rolls that determination over midnight and across method/location changes
//! without ever exposing a stale or internally inconsistent state.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Miqat` struct wires configuration, cache, and ticker
//!   together and exposes the surface consumed by a UI shell
//! - **Schedule**: `schedule` module holds the data model, the multi-day
//!   assembler, per-prayer minute adjustments, and the parameter-keyed cache
//! - **State**: `state` module is the pure current/next state machine
//! - **Ticker**: `ticker` module re-evaluates the state machine on a cadence
//!   and publishes atomically-replaced snapshots to subscribers
//! - **Provider**: `provider` module is the seam to the external time source;
//!   miqat never performs astronomical calculations itself
//! - **Infrastructure**: TOML configuration, timezone resolution, clock
//!   abstraction, and structured logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod location;
pub mod provider;
pub mod schedule;
pub mod state;
pub mod ticker;

mod miqat;

pub use error::ScheduleError;
pub use location::Location;
pub use miqat::Miqat;
pub use schedule::{
    AdjustmentSet, DaySchedule, Event, MethodId, Prayer, School, ScheduleParameters,
    ScheduleWindow, TimeFormat,
};
pub use state::{Evaluation, PrayerState};
pub use ticker::{StateUpdate, SubscriptionId};
