//! Settings validation.
//!
//! Range checks and value checks run on every load and before every
//! persisted change, so an invalid file or an invalid in-memory edit is
//! rejected with a message naming the offending field instead of surfacing
//! later as a confusing schedule failure.

use anyhow::{Result, bail};

use super::Settings;
use crate::constants::{
    MAX_ADJUSTMENT_MINUTES, MAX_TICK_INTERVAL_SECS, MAX_WINDOW_DAYS, MIN_TICK_INTERVAL_SECS,
};

/// Validate all settings fields that are present.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if let Some(lat) = settings.latitude {
        if !(-90.0..=90.0).contains(&lat) {
            bail!("latitude {lat} out of range (-90 to +90)");
        }
    }
    if let Some(lon) = settings.longitude {
        if !(-180.0..=180.0).contains(&lon) {
            bail!("longitude {lon} out of range (-180 to +180)");
        }
    }
    if settings.latitude.is_some() != settings.longitude.is_some() {
        bail!("latitude and longitude must be set together");
    }

    if let Some(school) = settings.school.as_deref() {
        if school != "standard" && school != "hanafi" {
            bail!("school {school:?} is not recognized (use \"standard\" or \"hanafi\")");
        }
    }

    if let Some(format) = settings.time_format.as_deref() {
        if format != "12h" && format != "24h" {
            bail!("time_format {format:?} is not recognized (use \"12h\" or \"24h\")");
        }
    }

    if let Some(days) = settings.window_days {
        if days == 0 || days > MAX_WINDOW_DAYS {
            bail!("window_days {days} out of range (1 to {MAX_WINDOW_DAYS})");
        }
    }

    if let Some(secs) = settings.tick_interval {
        if !(MIN_TICK_INTERVAL_SECS..=MAX_TICK_INTERVAL_SECS).contains(&secs) {
            bail!(
                "tick_interval {secs} out of range ({MIN_TICK_INTERVAL_SECS} to {MAX_TICK_INTERVAL_SECS} seconds)"
            );
        }
    }

    let named_offsets = [
        ("adjust_fajr", settings.adjust_fajr),
        ("adjust_dhuhr", settings.adjust_dhuhr),
        ("adjust_asr", settings.adjust_asr),
        ("adjust_maghrib", settings.adjust_maghrib),
        ("adjust_isha", settings.adjust_isha),
    ];
    for (field, offset) in named_offsets {
        if let Some(minutes) = offset {
            if minutes.abs() > MAX_ADJUSTMENT_MINUTES {
                bail!(
                    "{field} {minutes:+} out of range (-{MAX_ADJUSTMENT_MINUTES} to +{MAX_ADJUSTMENT_MINUTES} minutes)"
                );
            }
        }
    }

    Ok(())
}
