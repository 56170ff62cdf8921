//! Countdown ticker: periodic re-evaluation and publication.
//!
//! The ticker is the only writer of the live `StateUpdate`. It re-evaluates
//! the state machine against the cache's current window on a fixed cadence,
//! and immediately when `on_window_changed` is called after a successful
//! rebuild, so new parameters are reflected without waiting out a cadence
//! period. Ticks are cheap and never touch the network; the expensive
//! rebuild path lives entirely in the cache/assembler.
//!
//! Lifecycle is `Idle → Running → Idle`. There is no error state: an
//! exhausted window is published to subscribers as a distinct value and the
//! loop keeps running, recovering on its own once a refreshed window is
//! installed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration as StdDuration;

use crate::clock;
use crate::schedule::ScheduleCache;
use crate::state::{self, Evaluation, PrayerState};

/// What subscribers receive on every publication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateUpdate {
    /// The window has a future event; here is the live view
    Tracking(PrayerState),
    /// The cached window has fully elapsed; a wider or refreshed window is
    /// needed. Published as a value, never raised as an error.
    Exhausted,
}

impl StateUpdate {
    pub fn state(&self) -> Option<&PrayerState> {
        match self {
            StateUpdate::Tracking(state) => Some(state),
            StateUpdate::Exhausted => None,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&StateUpdate) + Send + Sync>;

struct Shared {
    cache: Arc<ScheduleCache>,
    latest: Mutex<Option<StateUpdate>>,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
    running: AtomicBool,
    poked: Mutex<bool>,
    wake: Condvar,
}

impl Shared {
    /// One re-evaluation: read the cached window, evaluate at the current
    /// instant, replace the published value atomically, notify subscribers.
    fn tick(&self) {
        let Some(window) = self.cache.get() else {
            // Nothing assembled yet; stay silent rather than publish a
            // half-meaningful value
            return;
        };

        let update = match state::evaluate(&window, clock::now()) {
            Evaluation::Tracking(state) => StateUpdate::Tracking(state),
            Evaluation::Exhausted => StateUpdate::Exhausted,
        };

        *self.latest.lock().unwrap() = Some(update);

        // Snapshot the list first: callbacks may subscribe or unsubscribe,
        // which must not deadlock against the notification pass
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(&update);
        }
    }

    /// Wait out one cadence period, returning early if poked.
    fn wait(&self, cadence: StdDuration) {
        let mut poked = self.poked.lock().unwrap();
        if !*poked {
            let (guard, _) = self.wake.wait_timeout(poked, cadence).unwrap();
            poked = guard;
        }
        *poked = false;
    }

    fn poke(&self) {
        let mut poked = self.poked.lock().unwrap();
        *poked = true;
        self.wake.notify_all();
    }
}

/// Long-lived periodic process owning the latest `StateUpdate`.
pub struct CountdownTicker {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CountdownTicker {
    pub fn new(cache: Arc<ScheduleCache>) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache,
                latest: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                poked: Mutex::new(false),
                wake: Condvar::new(),
            }),
            next_id: AtomicU64::new(1),
            handle: Mutex::new(None),
        }
    }

    /// Begin periodic re-evaluation. A no-op if already running.
    pub fn start(&self, cadence: StdDuration) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }

        log_block_start!("Starting countdown ticker ({:?} cadence)", cadence);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::spawn(move || {
            while shared.running.load(Ordering::SeqCst) {
                shared.tick();
                shared.wait(cadence);
            }
        });
        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Must be called after a successful rebuild produced a new window, so
    /// the new parameters are reflected immediately instead of after a full
    /// cadence period.
    pub fn on_window_changed(&self) {
        if self.shared.running.load(Ordering::SeqCst) {
            self.shared.poke();
        } else {
            // Not running: evaluate once so `latest` reflects the new window
            self.shared.tick();
        }
    }

    /// Halt the periodic process. Safe to call multiple times.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shared.poke();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        log_decorated!("Countdown ticker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// The most recently published value, if any window was ever evaluated.
    pub fn latest(&self) -> Option<StateUpdate> {
        *self.shared.latest.lock().unwrap()
    }

    /// Register a callback invoked on every publication.
    pub fn subscribe(&self, callback: impl Fn(&StateUpdate) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.shared
            .subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.shared
            .subscribers
            .lock()
            .unwrap()
            .retain(|(existing, _)| *existing != id);
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
