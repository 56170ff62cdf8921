//! Configuration system for miqat with validation and parameter derivation.
//!
//! Settings are loaded from a TOML file (`miqat.toml` in the platform config
//! directory by default) and persisted back whenever the embedding
//! application changes them. Most fields are optional and fall back to
//! defaults, so a minimal file with just coordinates is enough to run.
//!
//! ```toml
//! #[Location]
//! latitude = 21.4225       # Geographic latitude (-90 to +90)
//! longitude = 39.8262      # Geographic longitude (-180 to +180)
//! location_name = "Makkah" # Optional display name
//!
//! #[Calculation]
//! method = 3               # Calculation method id (passed through to the time source)
//! school = "standard"      # Asr convention: "standard" or "hanafi"
//!
//! #[Display]
//! time_format = "12h"      # "12h" or "24h"
//!
//! #[Schedule]
//! window_days = 7          # Days per schedule window (1-30)
//! tick_interval = 1        # Countdown re-evaluation cadence in seconds (1-300)
//!
//! #[Adjustments]
//! adjust_fajr = 0          # Per-prayer minute offsets (-30 to +30)
//! adjust_dhuhr = 0
//! adjust_asr = 0
//! adjust_maghrib = 0
//! adjust_isha = 0
//! ```

pub mod loading;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

use crate::constants::*;
use crate::error::ScheduleError;
use crate::location::Location;
use crate::schedule::{AdjustmentSet, MethodId, School, ScheduleParameters, TimeFormat};

// Re-export public API
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, save, set_config_dir};
pub use validation::validate_settings;

/// User-facing settings as stored on disk.
///
/// All fields are optional; accessors supply defaults. Coordinates are the
/// one thing that cannot be defaulted — without them no schedule can be
/// built, which `parameters()` surfaces as `LocationMissing`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Settings {
    /// Geographic latitude in degrees (-90 to +90)
    pub latitude: Option<f64>,
    /// Geographic longitude in degrees (-180 to +180)
    pub longitude: Option<f64>,
    /// Human-readable place name resolved upstream
    pub location_name: Option<String>,

    /// Calculation method identifier, opaque to the engine
    pub method: Option<u8>,
    /// Asr juristic school: "standard" or "hanafi"
    pub school: Option<String>,

    /// Time display format: "12h" or "24h"
    pub time_format: Option<String>,

    /// Days per assembled schedule window (1-30)
    pub window_days: Option<u32>,
    /// Countdown re-evaluation cadence in seconds (1-300)
    pub tick_interval: Option<u64>,

    /// Per-prayer minute offsets (-30 to +30 each)
    pub adjust_fajr: Option<i32>,
    pub adjust_dhuhr: Option<i32>,
    pub adjust_asr: Option<i32>,
    pub adjust_maghrib: Option<i32>,
    pub adjust_isha: Option<i32>,
}

impl Settings {
    pub fn window_days(&self) -> u32 {
        self.window_days.unwrap_or(DEFAULT_WINDOW_DAYS)
    }

    pub fn tick_interval(&self) -> StdDuration {
        self.tick_interval
            .map(StdDuration::from_secs)
            .unwrap_or(DEFAULT_TICK_INTERVAL)
    }

    pub fn school(&self) -> School {
        match self.school.as_deref() {
            Some("hanafi") => School::Hanafi,
            _ => School::Standard,
        }
    }

    pub fn time_format(&self) -> TimeFormat {
        match self.time_format.as_deref() {
            Some("24h") => TimeFormat::TwentyFourHour,
            _ => TimeFormat::TwelveHour,
        }
    }

    pub fn adjustment_offsets(&self) -> [i32; 5] {
        [
            self.adjust_fajr.unwrap_or(0),
            self.adjust_dhuhr.unwrap_or(0),
            self.adjust_asr.unwrap_or(0),
            self.adjust_maghrib.unwrap_or(0),
            self.adjust_isha.unwrap_or(0),
        ]
    }

    /// Derive the schedule parameters these settings describe.
    ///
    /// Callers are expected to have run `validate_settings` first;
    /// out-of-range adjustments are still rejected here rather than trusted.
    pub fn parameters(&self) -> anyhow::Result<ScheduleParameters> {
        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(ScheduleError::LocationMissing.into()),
        };

        let location = match &self.location_name {
            Some(name) => Location::with_name(latitude, longitude, name.clone()),
            None => Location::new(latitude, longitude),
        };
        if !location.is_valid() {
            return Err(ScheduleError::LocationMissing.into());
        }

        Ok(ScheduleParameters {
            location,
            method: MethodId(self.method.unwrap_or(DEFAULT_METHOD)),
            school: self.school(),
            adjustments: AdjustmentSet::new(self.adjustment_offsets())?,
            time_format: self.time_format(),
        })
    }

    /// Pretty-print the active settings.
    pub fn log_settings(&self) {
        log_block_start!("Loaded configuration");
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                log_indented!("Location: {}", match &self.location_name {
                    Some(name) => format!("{name} ({lat:.4}, {lon:.4})"),
                    None => format!("{lat:.4}, {lon:.4}"),
                });
            }
            _ => log_indented!("Location: not set"),
        }
        log_indented!("Method: {}", self.method.unwrap_or(DEFAULT_METHOD));
        log_indented!("School: {}", self.school().as_str());
        log_indented!("Window: {} days", self.window_days());
        log_indented!("Tick interval: {:?}", self.tick_interval());
        let offsets = self.adjustment_offsets();
        if offsets.iter().any(|&o| o != 0) {
            log_indented!(
                "Adjustments: fajr {:+}, dhuhr {:+}, asr {:+}, maghrib {:+}, isha {:+}",
                offsets[0],
                offsets[1],
                offsets[2],
                offsets[3],
                offsets[4]
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_are_absent() {
        let settings = Settings::default();
        assert_eq!(settings.window_days(), DEFAULT_WINDOW_DAYS);
        assert_eq!(settings.tick_interval(), DEFAULT_TICK_INTERVAL);
        assert_eq!(settings.school(), School::Standard);
        assert_eq!(settings.time_format(), TimeFormat::TwelveHour);
        assert_eq!(settings.adjustment_offsets(), [0; 5]);
    }

    #[test]
    fn parameters_require_coordinates() {
        let settings = Settings::default();
        let err = settings.parameters().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScheduleError>(),
            Some(ScheduleError::LocationMissing)
        ));
    }

    #[test]
    fn parameters_reflect_settings() {
        let settings = Settings {
            latitude: Some(21.4225),
            longitude: Some(39.8262),
            location_name: Some("Makkah".into()),
            method: Some(3),
            school: Some("hanafi".into()),
            time_format: Some("24h".into()),
            adjust_asr: Some(7),
            ..Default::default()
        };

        let params = settings.parameters().unwrap();
        assert_eq!(params.method, MethodId(3));
        assert_eq!(params.school, School::Hanafi);
        assert_eq!(params.time_format, TimeFormat::TwentyFourHour);
        assert_eq!(params.adjustments.offsets(), [0, 0, 7, 0, 0]);
        assert_eq!(params.location.describe(), "Makkah");
    }

    #[test]
    fn out_of_range_adjustment_is_rejected_in_derivation() {
        let settings = Settings {
            latitude: Some(21.4225),
            longitude: Some(39.8262),
            adjust_isha: Some(45),
            ..Default::default()
        };
        assert!(settings.parameters().is_err());
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let settings = Settings {
            latitude: Some(51.5074),
            longitude: Some(-0.1278),
            location_name: Some("London".into()),
            method: Some(2),
            window_days: Some(10),
            adjust_fajr: Some(-3),
            ..Default::default()
        };

        let text = toml::to_string(&settings).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
