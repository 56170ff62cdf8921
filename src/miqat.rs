//! Engine coordinator managing the complete lifecycle of the scheduler.
//!
//! `Miqat` wires the pieces together: settings in, schedule cache and
//! countdown ticker out. It is the surface an embedding application (UI
//! shell, status bar, chat frontend) talks to:
//!
//! - `state()` / `window()` — read the live view and the current window
//! - `update_parameters()` — change settings, rebuilding the window and
//!   refreshing the published state immediately
//! - `subscribe()` — receive every published state update
//!
//! Settings changes are single-writer: the settings lock is held across
//! validate → persist → rebuild, so two concurrent updates cannot interleave
//! their parameter reads.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

use crate::config::{self, Settings};
use crate::provider::PrayerTimeSource;
use crate::schedule::{ScheduleCache, ScheduleWindow};
use crate::ticker::{CountdownTicker, StateUpdate, SubscriptionId};

/// Application-facing engine handle.
pub struct Miqat {
    source: Arc<dyn PrayerTimeSource>,
    cache: Arc<ScheduleCache>,
    ticker: CountdownTicker,
    settings: Mutex<Settings>,
    persist: bool,
}

impl Miqat {
    /// Create an engine from explicit settings. Nothing is persisted back to
    /// disk unless `persistent()` is called.
    pub fn new(source: Arc<dyn PrayerTimeSource>, settings: Settings) -> Self {
        let cache = Arc::new(ScheduleCache::new());
        let ticker = CountdownTicker::new(Arc::clone(&cache));
        Self {
            source,
            cache,
            ticker,
            settings: Mutex::new(settings),
            persist: false,
        }
    }

    /// Create an engine from the on-disk configuration (creating the default
    /// file if none exists); subsequent settings changes are saved back.
    pub fn from_config(source: Arc<dyn PrayerTimeSource>) -> Result<Self> {
        let settings = config::load()?;
        Ok(Self::new(source, settings).persistent())
    }

    /// Save settings back to the config file on every accepted change.
    pub fn persistent(mut self) -> Self {
        self.persist = true;
        self
    }

    /// Build the initial window and begin ticking.
    ///
    /// Fails when settings are invalid, the location is missing, or the
    /// first assembly fails — there is nothing meaningful to tick over
    /// until one window exists.
    pub fn start(&self) -> Result<()> {
        log_version!();
        let settings = self.settings.lock().unwrap();
        settings.log_settings();
        config::validate_settings(&settings)?;

        let params = settings.parameters()?;
        self.cache
            .ensure(self.source.as_ref(), &params, settings.window_days())
            .context("Failed to build the initial schedule window")?;

        self.ticker.on_window_changed();
        self.ticker.start(settings.tick_interval());
        Ok(())
    }

    /// The most recently published state, if any.
    pub fn state(&self) -> Option<StateUpdate> {
        self.ticker.latest()
    }

    /// The currently cached schedule window, if one was ever built.
    pub fn window(&self) -> Option<Arc<ScheduleWindow>> {
        self.cache.get()
    }

    /// When the current window's data was fetched. After a failed refresh
    /// this lets the caller show "last updated at T" next to the stale view.
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.cache.built_at()
    }

    /// A snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    /// Apply a settings change: validate, persist, rebuild the window, and
    /// refresh the published state immediately.
    ///
    /// On failure the previous settings, window, and published state all
    /// remain in effect — a failed refresh degrades to last-known-good, and
    /// the error is reported once, here, to the caller.
    pub fn update_parameters(&self, mutate: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut settings = self.settings.lock().unwrap();

        let mut candidate = settings.clone();
        mutate(&mut candidate);
        config::validate_settings(&candidate)?;
        let params = candidate.parameters()?;

        self.cache
            .ensure(self.source.as_ref(), &params, candidate.window_days())
            .context("Failed to rebuild schedule for the new parameters")?;

        // Persist only once the change has actually taken effect
        if self.persist {
            config::save(&candidate)?;
        }

        *settings = candidate;
        drop(settings);

        self.ticker.on_window_changed();
        Ok(())
    }

    /// Register a callback invoked on every state publication.
    pub fn subscribe(
        &self,
        callback: impl Fn(&StateUpdate) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.ticker.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.ticker.unsubscribe(id)
    }

    /// Halt the ticker. Safe to call multiple times; `start` may be called
    /// again afterwards.
    pub fn stop(&self) {
        self.ticker.stop();
        log_end!();
    }
}
