//! Configuration loading and persistence.
//!
//! Handles path resolution (with an overridable base directory for tests and
//! embedders), default-file generation on first load, and saving settings
//! back to disk. miqat treats persistence as a plain load-at-start /
//! save-on-change collaborator; nothing here is hot-reloaded.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Settings;
use super::validation::validate_settings;

/// Global configuration directory override, set once per process
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Commented template written when no configuration file exists yet.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"#[Location]
# latitude = 21.4225       # Geographic latitude (-90 to +90)
# longitude = 39.8262      # Geographic longitude (-180 to +180)
# location_name = "Makkah" # Optional display name

#[Calculation]
method = 3                 # Calculation method id (passed through to the time source)
school = "standard"        # Asr convention: "standard" or "hanafi"

#[Display]
time_format = "12h"        # "12h" or "24h"

#[Schedule]
window_days = 7            # Days per schedule window (1-30)
tick_interval = 1          # Countdown re-evaluation cadence in seconds (1-300)

#[Adjustments]
adjust_fajr = 0            # Per-prayer minute offsets (-30 to +30)
adjust_dhuhr = 0
adjust_asr = 0
adjust_maghrib = 0
adjust_isha = 0
"#;

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the custom configuration directory if one was set.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Resolve the path of `miqat.toml`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom) = get_custom_config_dir() {
        return Ok(custom.join("miqat.toml"));
    }
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("miqat").join("miqat.toml"))
}

/// Load settings using automatic path detection.
///
/// Writes the commented default template first if no file exists.
pub fn load() -> Result<Settings> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        create_default_config(&config_path)
            .context("Failed to create default config during load")?;
    }

    load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Load settings from a specific path. Does not create a default file.
pub fn load_from_path(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let settings: Settings = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    validate_settings(&settings)?;
    Ok(settings)
}

/// Persist settings to the resolved config path.
pub fn save(settings: &Settings) -> Result<()> {
    let config_path = get_config_path()?;
    save_to_path(settings, &config_path)
}

/// Persist settings to a specific path, creating parent directories.
pub fn save_to_path(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    let content =
        toml::to_string_pretty(settings).context("Failed to serialize settings to TOML")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

/// Write the commented default template to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;
    log_decorated!("Created default configuration at {}", path.display());
    Ok(())
}
