//! Resolved location value object and coordinate timezone detection.
//!
//! The engine never resolves place names to coordinates; it consumes an
//! already-resolved coordinate pair (with an optional display name supplied
//! by whatever reverse-geocoded it). What it does own is mapping coordinates
//! to an IANA timezone, because "today" for a schedule window is the date at
//! the *location*, not the date wherever the process happens to run.

use chrono_tz::Tz;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tzf_rs::DefaultFinder;

/// Shared timezone finder. Building the finder parses the embedded polygon
/// data, so it is constructed once and reused.
static TZ_FINDER: Lazy<DefaultFinder> = Lazy::new(DefaultFinder::new);

/// A resolved geographic location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Geographic latitude in degrees (-90 to +90)
    pub latitude: f64,
    /// Geographic longitude in degrees (-180 to +180)
    pub longitude: f64,
    /// Human-readable place name, if one was resolved upstream
    pub display_name: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            display_name: None,
        }
    }

    pub fn with_name(latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            display_name: Some(name.into()),
        }
    }

    /// Check that both coordinates are within their valid ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Determine the timezone of these coordinates.
    ///
    /// Falls back to UTC when the detected name cannot be parsed (ocean
    /// coordinates resolve to Etc/GMT offsets, which chrono-tz does know, so
    /// the fallback is effectively unreachable on real input).
    pub fn timezone(&self) -> Tz {
        determine_timezone_from_coordinates(self.latitude, self.longitude)
    }

    /// Name suitable for log output: the display name when present,
    /// otherwise formatted coordinates.
    pub fn describe(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => format!("{:.4}, {:.4}", self.latitude, self.longitude),
        }
    }
}

/// Determine the timezone for the given coordinates.
pub fn determine_timezone_from_coordinates(latitude: f64, longitude: f64) -> Tz {
    // tzf-rs takes (lon, lat) order
    let tz_name = TZ_FINDER.get_tz_name(longitude, latitude);
    tz_name.parse::<Tz>().unwrap_or(chrono_tz::UTC)
}
