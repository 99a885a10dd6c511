//! Hearts: consumable lives with time-based regeneration.
//!
//! ## States
//!
//! ```text
//! Full (current == max, no tick scheduled)
//!   -- use_hearts -->  Regenerating (current < max, next_regeneration_time set)
//!   <-- reconcile / add_hearts / refill_hearts --
//! ```
//!
//! Regeneration is reconciled against the injected clock rather than
//! counted by timers, so time spent with the app closed is credited on the
//! next pass. A pass runs on `initialize()`, on every ticker period, on
//! visibility-regain, and before `use_hearts` / `has_enough_hearts`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioPlayer, SoundCue};
use crate::clock::Clock;
use crate::currency::CurrencyEngine;
use crate::error::Result;
use crate::events::HeartsChangeEvent;
use crate::observer::{ListenerId, Listeners};
use crate::service::{Service, ServiceStatus, StatusCell};
use crate::storage::{KeyValueStore, KeyValueStoreExt};

pub const STORAGE_KEY: &str = "user-hearts";
pub const MAX_HEARTS: u32 = 5;
pub const REGENERATION_TIME_MINUTES: u32 = 30;
pub const COST_PER_REFILL: u64 = 20;
pub const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

const COMPONENT: &str = "HeartsEngine";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartsConfig {
    pub max_hearts: u32,
    pub regeneration_minutes: u32,
    pub refill_cost: u64,
    pub tick_interval: std::time::Duration,
}

impl Default for HeartsConfig {
    fn default() -> Self {
        Self {
            max_hearts: MAX_HEARTS,
            regeneration_minutes: REGENERATION_TIME_MINUTES,
            refill_cost: COST_PER_REFILL,
            tick_interval: TICK_INTERVAL,
        }
    }
}

impl HeartsConfig {
    fn regeneration_time(&self) -> Duration {
        Duration::minutes(i64::from(self.regeneration_minutes.max(1)))
    }
}

/// The persisted hearts document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartsData {
    pub current: u32,
    pub max: u32,
    pub last_regeneration: DateTime<Utc>,
    /// `None` while full.
    #[serde(default)]
    pub next_regeneration_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_premium: bool,
}

impl HeartsData {
    fn full(max: u32, now: DateTime<Utc>) -> Self {
        Self {
            current: max,
            max,
            last_regeneration: now,
            next_regeneration_time: None,
            is_premium: false,
        }
    }
}

/// A heart-count change waiting to be announced once the state lock is released.
struct Emission {
    event: HeartsChangeEvent,
    cue: Option<SoundCue>,
}

fn change(old: u32, new: u32, reason: &str) -> HeartsChangeEvent {
    HeartsChangeEvent {
        old_hearts: old,
        new_hearts: new,
        change: i64::from(new) - i64::from(old),
        reason: reason.to_string(),
    }
}

pub struct HeartsEngine {
    me: Weak<HeartsEngine>,
    data: Mutex<HeartsData>,
    config: HeartsConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    audio: Arc<dyn AudioPlayer>,
    currency: Arc<CurrencyEngine>,
    listeners: Listeners<HeartsChangeEvent>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    status: StatusCell,
}

impl HeartsEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioPlayer>,
        currency: Arc<CurrencyEngine>,
        config: HeartsConfig,
    ) -> Arc<Self> {
        let initial = HeartsData::full(config.max_hearts.max(1), clock.now());
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            data: Mutex::new(initial),
            config,
            store,
            clock,
            audio,
            currency,
            listeners: Listeners::new(COMPONENT),
            ticker: Mutex::new(None),
            status: StatusCell::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HeartsData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> Result<HeartsData> {
        let fallback = || HeartsData::full(self.config.max_hearts.max(1), self.clock.now());
        match self.store.get_item::<HeartsData>(STORAGE_KEY) {
            Ok(Some(mut data)) => {
                data.max = data.max.max(1);
                data.current = data.current.min(data.max);
                Ok(data)
            }
            Ok(None) => Ok(fallback()),
            Err(e) if e.is_decode() => {
                warn!(component = COMPONENT, error = %e, "Stored hearts data unreadable, using defaults");
                Ok(fallback())
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, data: &HeartsData) {
        if let Err(e) = self.store.set_item(STORAGE_KEY, data) {
            error!(component = COMPONENT, error = %e, "Failed to save hearts data");
        }
    }

    fn emit(&self, emission: Option<Emission>) {
        if let Some(Emission { event, cue }) = emission {
            if let Some(cue) = cue {
                self.audio.play(cue);
            }
            self.listeners.notify(&event);
        }
    }

    fn arm(&self, data: &mut HeartsData, now: DateTime<Utc>) {
        data.last_regeneration = now;
        data.next_regeneration_time = Some(now + self.config.regeneration_time());
    }

    /// One reconciliation pass over `data`. Returns whether the document
    /// changed and the heart-count change to announce, if any.
    fn regenerate(&self, data: &mut HeartsData, now: DateTime<Utc>) -> (bool, Option<Emission>) {
        if data.is_premium {
            if data.current < data.max {
                let old = data.current;
                data.current = data.max;
                data.next_regeneration_time = None;
                let event = change(old, data.current, "premium");
                return (true, Some(Emission { event, cue: None }));
            }
            return (data.next_regeneration_time.take().is_some(), None);
        }

        if data.current >= data.max {
            if data.next_regeneration_time.take().is_some() {
                return (true, None);
            }
            return (false, None);
        }

        let Some(next) = data.next_regeneration_time else {
            // Below max with nothing scheduled, e.g. after capacity was raised.
            self.arm(data, now);
            return (true, None);
        };

        if now < next {
            return (false, None);
        }

        let period = self.config.regeneration_time();
        let ticks = (now - next).num_milliseconds() / period.num_milliseconds() + 1;
        let deficit = data.max - data.current;
        let granted = ticks.min(i64::from(deficit)) as u32;

        let old = data.current;
        data.current += granted;
        data.last_regeneration = next + period * (granted as i32 - 1);
        data.next_regeneration_time = if data.current < data.max {
            Some(data.last_regeneration + period)
        } else {
            None
        };

        let event = change(old, data.current, "regeneration");
        (
            true,
            Some(Emission {
                event,
                cue: Some(SoundCue::HeartRegenerate),
            }),
        )
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Run a regeneration pass. Safe to call any number of times.
    pub fn reconcile(&self) {
        let emission = {
            let mut data = self.lock();
            let (dirty, emission) = self.regenerate(&mut data, self.clock.now());
            if dirty {
                self.save(&data);
            }
            emission
        };
        self.emit(emission);
    }

    /// Hook for the shell: the window or tab became visible again.
    pub fn on_visibility_regained(&self) {
        debug!(component = COMPONENT, "Visibility regained, reconciling hearts");
        self.reconcile();
    }

    /// Spend `count` hearts. Premium users always succeed without losing any.
    pub fn use_hearts(&self, count: u32, reason: &str) -> bool {
        let (ok, regen, used) = {
            let mut data = self.lock();
            let now = self.clock.now();
            let (dirty, regen) = self.regenerate(&mut data, now);

            if data.is_premium || count == 0 {
                if dirty {
                    self.save(&data);
                }
                (true, regen, None)
            } else if data.current < count {
                if dirty {
                    self.save(&data);
                }
                (false, regen, None)
            } else {
                let old = data.current;
                let was_full = data.current == data.max;
                data.current -= count;
                if was_full {
                    self.arm(&mut data, now);
                }
                self.save(&data);
                let event = change(old, data.current, reason);
                (
                    true,
                    regen,
                    Some(Emission {
                        event,
                        cue: Some(SoundCue::HeartLost),
                    }),
                )
            }
        };

        self.emit(regen);
        self.emit(used);
        ok
    }

    /// Grant up to `count` hearts, capped at max. Ignored for premium users.
    pub fn add_hearts(&self, count: u32, reason: &str) {
        let emission = {
            let mut data = self.lock();
            if data.is_premium {
                return;
            }

            let old = data.current;
            let new = data.current.saturating_add(count).min(data.max);
            if new == old {
                return;
            }

            data.current = new;
            if data.current >= data.max {
                data.next_regeneration_time = None;
            } else if data.next_regeneration_time.is_none() {
                let now = self.clock.now();
                self.arm(&mut data, now);
            }
            self.save(&data);

            Emission {
                event: change(old, new, reason),
                cue: Some(SoundCue::HeartGain),
            }
        };

        self.emit(Some(emission));
    }

    /// Buy a full refill for the configured price.
    ///
    /// Returns false when already full or when the purchase is declined.
    pub fn refill_hearts(&self) -> bool {
        let deficit = {
            let data = self.lock();
            if data.is_premium {
                return true;
            }
            if data.current >= data.max {
                return false;
            }
            data.max - data.current
        };

        let paid = self.currency.spend_currency(
            self.config.refill_cost as i64,
            "heart_refill",
            Some("Refill all hearts"),
        );
        if paid {
            self.add_hearts(deficit, "refill");
        } else {
            debug!(component = COMPONENT, cost = self.config.refill_cost, "Refill declined");
        }
        paid
    }

    /// Change capacity. Current hearts are clamped down when above the new max.
    pub fn set_max_hearts(&self, max: u32) {
        let emission = {
            let mut data = self.lock();
            let old = data.current;
            data.max = max.max(1);
            if data.is_premium || data.current > data.max {
                data.current = data.max;
            }

            if data.current >= data.max {
                data.next_regeneration_time = None;
            } else if data.next_regeneration_time.is_none() {
                let now = self.clock.now();
                self.arm(&mut data, now);
            }
            self.save(&data);

            (data.current != old).then(|| Emission {
                event: change(old, data.current, "max_changed"),
                cue: None,
            })
        };

        self.emit(emission);
    }

    /// Turning premium on tops hearts up to max immediately.
    pub fn set_premium_status(&self, premium: bool) {
        let emission = {
            let mut data = self.lock();
            data.is_premium = premium;
            let mut emission = None;
            if premium && data.current < data.max {
                let old = data.current;
                data.current = data.max;
                data.next_regeneration_time = None;
                emission = Some(Emission {
                    event: change(old, data.current, "premium"),
                    cue: None,
                });
            }
            self.save(&data);
            emission
        };

        info!(component = COMPONENT, premium, "Premium status updated");
        self.emit(emission);
    }

    /// Restore full default hearts (premium off) and persist.
    pub fn reset_hearts(&self) {
        let mut data = self.lock();
        *data = HeartsData::full(self.config.max_hearts.max(1), self.clock.now());
        self.save(&data);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn has_enough_hearts(&self, needed: u32) -> bool {
        self.reconcile();
        let data = self.lock();
        data.is_premium || data.current >= needed
    }

    /// Snapshot after a reconciliation pass.
    pub fn hearts_data(&self) -> HeartsData {
        self.reconcile();
        self.lock().clone()
    }

    pub fn current_hearts(&self) -> u32 {
        self.lock().current
    }

    pub fn max_hearts(&self) -> u32 {
        self.lock().max
    }

    pub fn is_premium(&self) -> bool {
        self.lock().is_premium
    }

    pub fn config(&self) -> &HeartsConfig {
        &self.config
    }

    /// Milliseconds until the next scheduled heart, zero when full.
    pub fn time_until_next_heart(&self) -> i64 {
        let data = self.lock();
        match data.next_regeneration_time {
            Some(next) if data.current < data.max => {
                (next - self.clock.now()).num_milliseconds().max(0)
            }
            _ => 0,
        }
    }

    /// `MM:SS` countdown to the next heart, rounding seconds up.
    pub fn format_time_until_next_heart(&self) -> String {
        let ms = self.time_until_next_heart();
        if ms <= 0 {
            return "00:00".to_string();
        }
        let total_secs = (ms + 999) / 1000;
        format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&HeartsChangeEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    // ── Ticker ───────────────────────────────────────────────────────

    /// Spawn the periodic reconciliation task on the current tokio runtime.
    /// Without a runtime the caller drives [`HeartsEngine::reconcile`].
    fn start_ticker(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(component = COMPONENT, "No async runtime, regeneration ticker not started");
            return;
        };

        let engine = self.me.clone();
        let period = self.config.tick_interval;
        let task = runtime.spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.reconcile();
            }
        });

        let previous = self
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_ticker(&self) {
        let task = self.ticker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Service for HeartsEngine {
    fn initialize(&self) -> Result<()> {
        if !self.status.begin() {
            return Ok(());
        }

        match self.load() {
            Ok(loaded) => {
                *self.lock() = loaded;
                self.reconcile();
                self.start_ticker();
                self.status.succeed();
                info!(component = COMPONENT, "Hearts service initialized");
                Ok(())
            }
            Err(e) => {
                error!(component = COMPONENT, error = %e, "Failed to initialize hearts service");
                self.status.fail(&e);
                Err(e)
            }
        }
    }

    fn cleanup(&self) -> Result<()> {
        self.stop_ticker();
        let data = self.lock();
        let saved = self.store.set_item(STORAGE_KEY, &*data);
        drop(data);
        self.status.reset();
        info!(component = COMPONENT, "Hearts service cleaned up");
        saved
    }

    fn is_initialized(&self) -> bool {
        self.status.is_initialized()
    }

    fn is_initializing(&self) -> bool {
        self.status.is_initializing()
    }

    fn status(&self) -> ServiceStatus {
        self.status.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentAudio;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    struct Harness {
        hearts: Arc<HeartsEngine>,
        currency: Arc<CurrencyEngine>,
        clock: Arc<ManualClock>,
        store: Arc<dyn KeyValueStore>,
    }

    fn start_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn harness() -> Harness {
        harness_on(Arc::new(MemoryStore::new()))
    }

    fn harness_on(store: Arc<dyn KeyValueStore>) -> Harness {
        let clock = start_clock();
        let audio: Arc<dyn AudioPlayer> = Arc::new(SilentAudio);
        let currency = Arc::new(CurrencyEngine::new(
            store.clone(),
            clock.clone(),
            audio.clone(),
        ));
        let hearts = HeartsEngine::new(
            store.clone(),
            clock.clone(),
            audio,
            currency.clone(),
            HeartsConfig::default(),
        );
        hearts.initialize().unwrap();
        Harness {
            hearts,
            currency,
            clock,
            store,
        }
    }

    fn stored(h: &Harness) -> HeartsData {
        h.store.get_item(STORAGE_KEY).unwrap().unwrap()
    }

    #[test]
    fn using_from_full_arms_regeneration() {
        let h = harness();
        assert!(h.hearts.use_hearts(1, "fail"));
        let data = h.hearts.hearts_data();
        assert_eq!(data.current, 4);
        assert_eq!(
            data.next_regeneration_time,
            Some(h.clock.now() + Duration::minutes(30))
        );
        assert_eq!(h.hearts.format_time_until_next_heart(), "30:00");
    }

    #[test]
    fn second_use_keeps_existing_schedule() {
        let h = harness();
        h.hearts.use_hearts(1, "fail");
        let scheduled = h.hearts.hearts_data().next_regeneration_time;
        h.clock.advance(Duration::minutes(10));
        h.hearts.use_hearts(1, "fail");
        assert_eq!(h.hearts.hearts_data().next_regeneration_time, scheduled);
    }

    #[test]
    fn cannot_use_more_than_current() {
        let h = harness();
        assert!(!h.hearts.use_hearts(6, "fail"));
        assert_eq!(h.hearts.current_hearts(), 5);
    }

    #[test]
    fn regenerates_exactly_at_boundary() {
        let h = harness();
        h.hearts.use_hearts(1, "fail");
        h.clock.advance(Duration::minutes(30));
        h.hearts.reconcile();
        let data = h.hearts.hearts_data();
        assert_eq!(data.current, 5);
        assert_eq!(data.next_regeneration_time, None);
    }

    #[test]
    fn catch_up_preserves_cadence() {
        let h = harness();
        let start = h.clock.now();
        h.hearts.use_hearts(4, "fail");
        // Ticks land at +30, +60, +90; +95 is between the third and fourth.
        h.clock.advance(Duration::minutes(95));
        h.hearts.reconcile();

        let data = h.hearts.hearts_data();
        assert_eq!(data.current, 4);
        assert_eq!(data.last_regeneration, start + Duration::minutes(90));
        assert_eq!(
            data.next_regeneration_time,
            Some(start + Duration::minutes(120))
        );
    }

    #[test]
    fn exact_multiple_does_not_over_grant() {
        let h = harness();
        h.hearts.use_hearts(4, "fail");
        h.clock.advance(Duration::minutes(60));
        h.hearts.reconcile();
        assert_eq!(h.hearts.current_hearts(), 3);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let h = harness();
        h.hearts.use_hearts(3, "fail");
        h.clock.advance(Duration::minutes(45));
        h.hearts.reconcile();
        let first = h.hearts.hearts_data();
        h.hearts.reconcile();
        assert_eq!(h.hearts.hearts_data(), first);
    }

    #[test]
    fn add_hearts_caps_and_clears_schedule() {
        let h = harness();
        h.hearts.use_hearts(2, "fail");
        h.hearts.add_hearts(10, "gift");
        let data = h.hearts.hearts_data();
        assert_eq!(data.current, 5);
        assert!(data.next_regeneration_time.is_none());
    }

    #[test]
    fn refill_spends_currency() {
        let h = harness();
        h.currency.add_currency(25, "seed", None);
        h.hearts.use_hearts(2, "fail");

        assert!(h.hearts.refill_hearts());
        assert_eq!(h.hearts.current_hearts(), 5);
        assert_eq!(h.currency.balance(), 5);

        assert!(!h.hearts.refill_hearts());
        assert_eq!(h.currency.balance(), 5);
    }

    #[test]
    fn refill_without_funds_fails() {
        let h = harness();
        h.hearts.use_hearts(2, "fail");
        assert!(!h.hearts.refill_hearts());
        assert_eq!(h.hearts.current_hearts(), 3);
    }

    #[test]
    fn premium_tops_up_and_bypasses_use() {
        let h = harness();
        h.hearts.use_hearts(3, "fail");
        h.hearts.set_premium_status(true);
        assert_eq!(h.hearts.current_hearts(), 5);

        assert!(h.hearts.use_hearts(3, "fail"));
        assert_eq!(h.hearts.current_hearts(), 5);
        assert!(h.hearts.has_enough_hearts(100));
        assert!(h.hearts.refill_hearts());
    }

    #[test]
    fn set_max_clamps_and_rearms() {
        let h = harness();
        h.hearts.set_max_hearts(3);
        assert_eq!(h.hearts.current_hearts(), 3);
        assert_eq!(h.hearts.max_hearts(), 3);

        h.hearts.set_max_hearts(8);
        let data = h.hearts.hearts_data();
        assert_eq!(data.current, 3);
        assert_eq!(data.max, 8);
        assert!(data.next_regeneration_time.is_some());

        h.hearts.set_max_hearts(0);
        assert_eq!(h.hearts.max_hearts(), 1);
    }

    #[test]
    fn premium_off_restores_normal_checks() {
        let h = harness();
        h.hearts.set_premium_status(true);
        assert!(h.hearts.has_enough_hearts(100));

        h.hearts.set_premium_status(false);
        assert!(!h.hearts.has_enough_hearts(100));
        assert!(h.hearts.has_enough_hearts(5));
        assert!(h.hearts.use_hearts(2, "fail"));
        assert_eq!(h.hearts.current_hearts(), 3);

        h.hearts.set_premium_status(true);
        assert_eq!(h.hearts.current_hearts(), 5);
        assert!(h.hearts.has_enough_hearts(100));
        assert!(stored(&h).is_premium);
    }

    #[test]
    fn full_premium_document_drops_stale_schedule() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let now = start_clock().now();
        store
            .set_item(
                STORAGE_KEY,
                &HeartsData {
                    current: 5,
                    max: 5,
                    last_regeneration: now - Duration::minutes(10),
                    next_regeneration_time: Some(now + Duration::minutes(20)),
                    is_premium: true,
                },
            )
            .unwrap();

        let h = harness_on(store);
        assert_eq!(h.hearts.hearts_data().next_regeneration_time, None);
        assert_eq!(stored(&h).next_regeneration_time, None);
        assert_eq!(h.hearts.time_until_next_heart(), 0);
    }

    #[test]
    fn visibility_regained_credits_elapsed_time() {
        let h = harness();
        let events: Arc<Mutex<Vec<i64>>> = Arc::default();
        let sink = events.clone();
        h.hearts
            .subscribe(move |e: &HeartsChangeEvent| sink.lock().unwrap().push(e.change));

        h.hearts.use_hearts(2, "fail");
        h.clock.advance(Duration::minutes(30));
        h.hearts.on_visibility_regained();

        // current_hearts() does not reconcile on its own.
        assert_eq!(h.hearts.current_hearts(), 4);
        assert_eq!(*events.lock().unwrap(), vec![-2, 1]);
        assert_eq!(stored(&h).current, 4);
    }

    #[test]
    fn reset_restores_full_default_hearts() {
        let h = harness();
        h.hearts.set_max_hearts(8);
        h.hearts.set_premium_status(true);
        h.hearts.set_premium_status(false);
        h.hearts.use_hearts(3, "fail");

        h.hearts.reset_hearts();
        let data = h.hearts.hearts_data();
        assert_eq!(data.current, 5);
        assert_eq!(data.max, 5);
        assert!(!data.is_premium);
        assert_eq!(data.next_regeneration_time, None);
        assert_eq!(stored(&h), data);
    }

    #[test]
    fn cleanup_persists_state() {
        let h = harness();
        h.hearts.use_hearts(2, "fail");
        h.hearts.cleanup().unwrap();
        assert!(!h.hearts.is_initialized());
    }
}
