//! Daily practice streaks with freeze tokens.
//!
//! Days are compared at calendar granularity through [`Clock::today`].
//! A single missed day can be bridged by one freeze; longer gaps reset.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioPlayer, SoundCue};
use crate::clock::Clock;
use crate::error::Result;
use crate::events::{StreakChangeEvent, StreakChangeKind};
use crate::observer::{ListenerId, Listeners};
use crate::service::{Service, ServiceStatus, StatusCell};
use crate::storage::{KeyValueStore, KeyValueStoreExt};

pub const STORAGE_KEY: &str = "user-streak";

const COMPONENT: &str = "StreakEngine";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakHistoryEntry {
    pub date: NaiveDate,
    pub practiced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_streak: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakData {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_practice_date: Option<NaiveDate>,
    pub streak_freezes: u32,
    #[serde(default)]
    pub streak_history: Vec<StreakHistoryEntry>,
}

pub struct StreakEngine {
    data: Mutex<StreakData>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    audio: Arc<dyn AudioPlayer>,
    listeners: Listeners<StreakChangeEvent>,
    status: StatusCell,
}

impl StreakEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            data: Mutex::new(StreakData::default()),
            store,
            clock,
            audio,
            listeners: Listeners::new(COMPONENT),
            status: StatusCell::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreakData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> Result<StreakData> {
        match self.store.get_item::<StreakData>(STORAGE_KEY) {
            Ok(Some(mut data)) => {
                data.longest_streak = data.longest_streak.max(data.current_streak);
                Ok(data)
            }
            Ok(None) => Ok(StreakData::default()),
            Err(e) if e.is_decode() => {
                warn!(component = COMPONENT, error = %e, "Stored streak data unreadable, using defaults");
                Ok(StreakData::default())
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, data: &StreakData) {
        if let Err(e) = self.store.set_item(STORAGE_KEY, data) {
            error!(component = COMPONENT, error = %e, "Failed to save streak data");
        }
    }

    /// Apply the day-gap rules to `data`. Returns the change to announce.
    fn check_gap(&self, data: &mut StreakData, today: NaiveDate) -> Option<StreakChangeEvent> {
        let last = data.last_practice_date?;
        let days_since = (today - last).num_days();

        match days_since {
            // Negative means the clock moved backwards; treat as practiced today.
            d if d <= 1 => None,
            2 if data.streak_freezes > 0 => {
                let skipped = today - Duration::days(1);
                data.streak_freezes -= 1;
                data.last_practice_date = Some(skipped);
                data.streak_history.push(StreakHistoryEntry {
                    date: skipped,
                    practiced: false,
                    frozen_streak: Some(true),
                });
                info!(component = COMPONENT, date = %skipped, "Streak freeze used");
                Some(StreakChangeEvent {
                    old_streak: data.current_streak,
                    new_streak: data.current_streak,
                    kind: StreakChangeKind::Frozen,
                })
            }
            _ if data.current_streak > 0 => {
                let old = data.current_streak;
                data.current_streak = 0;
                info!(component = COMPONENT, days_since, old_streak = old, "Streak broken");
                Some(StreakChangeEvent {
                    old_streak: old,
                    new_streak: 0,
                    kind: StreakChangeKind::Reset,
                })
            }
            _ => None,
        }
    }

    /// Re-check the streak against today's date.
    pub fn reconcile(&self) {
        let event = {
            let mut data = self.lock();
            let today = self.clock.today();
            let event = self.check_gap(&mut data, today);
            if event.is_some() {
                self.save(&data);
            }
            event
        };

        if let Some(event) = event {
            self.listeners.notify(&event);
        }
    }

    /// Record today's practice. At most one effective increment per day.
    pub fn record_practice(&self) -> StreakData {
        let (snapshot, gap, practiced) = {
            let mut data = self.lock();
            let today = self.clock.today();
            let gap = self.check_gap(&mut data, today);

            if data.last_practice_date.is_some_and(|last| last >= today) {
                if gap.is_some() {
                    self.save(&data);
                }
                (data.clone(), gap, None)
            } else {
                let old = data.current_streak;
                let yesterday = today - Duration::days(1);
                if data.last_practice_date == Some(yesterday) || data.current_streak == 0 {
                    data.current_streak += 1;
                } else {
                    data.current_streak = 1;
                }
                data.longest_streak = data.longest_streak.max(data.current_streak);
                data.last_practice_date = Some(today);
                data.streak_history.push(StreakHistoryEntry {
                    date: today,
                    practiced: true,
                    frozen_streak: None,
                });
                self.save(&data);

                let event = StreakChangeEvent {
                    old_streak: old,
                    new_streak: data.current_streak,
                    kind: StreakChangeKind::Practiced,
                };
                (data.clone(), gap, Some(event))
            }
        };

        if let Some(gap) = gap {
            self.listeners.notify(&gap);
        }
        if let Some(event) = practiced {
            debug!(component = COMPONENT, streak = event.new_streak, "Practice recorded");
            self.audio.play(SoundCue::Streak);
            self.listeners.notify(&event);
        }
        snapshot
    }

    pub fn add_streak_freezes(&self, count: u32) -> StreakData {
        let mut data = self.lock();
        data.streak_freezes = data.streak_freezes.saturating_add(count);
        self.save(&data);
        data.clone()
    }

    /// History entries dated within the given calendar month. Invalid months yield nothing.
    pub fn get_monthly_streak_history(&self, year: i32, month: u32) -> Vec<StreakHistoryEntry> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Vec::new();
        }
        self.lock()
            .streak_history
            .iter()
            .filter(|entry| entry.date.year() == year && entry.date.month() == month)
            .cloned()
            .collect()
    }

    pub fn reset_streak_data(&self) {
        let mut data = self.lock();
        *data = StreakData::default();
        self.save(&data);
    }

    pub fn streak_data(&self) -> StreakData {
        self.lock().clone()
    }

    pub fn current_streak(&self) -> u32 {
        self.lock().current_streak
    }

    pub fn longest_streak(&self) -> u32 {
        self.lock().longest_streak
    }

    pub fn streak_freezes(&self) -> u32 {
        self.lock().streak_freezes
    }

    pub fn has_practiced_today(&self) -> bool {
        self.lock().last_practice_date == Some(self.clock.today())
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StreakChangeEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl Service for StreakEngine {
    fn initialize(&self) -> Result<()> {
        if !self.status.begin() {
            return Ok(());
        }

        match self.load() {
            Ok(loaded) => {
                *self.lock() = loaded;
                self.reconcile();
                self.status.succeed();
                info!(component = COMPONENT, "Streak service initialized");
                Ok(())
            }
            Err(e) => {
                error!(component = COMPONENT, error = %e, "Failed to initialize streak service");
                self.status.fail(&e);
                Err(e)
            }
        }
    }

    fn cleanup(&self) -> Result<()> {
        let data = self.lock();
        let saved = self.store.set_item(STORAGE_KEY, &*data);
        drop(data);
        self.status.reset();
        info!(component = COMPONENT, "Streak service cleaned up");
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
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, d).unwrap()
    }

    fn setup(seed: Option<StreakData>) -> (StreakEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2023, 5, 10, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::new());
        if let Some(seed) = seed {
            store.set_item(STORAGE_KEY, &seed).unwrap();
        }
        let engine = StreakEngine::new(store, clock.clone(), Arc::new(SilentAudio));
        engine.initialize().unwrap();
        (engine, clock)
    }

    fn seeded(current: u32, last: u32, freezes: u32) -> StreakData {
        StreakData {
            current_streak: current,
            longest_streak: current,
            last_practice_date: Some(day(last)),
            streak_freezes: freezes,
            streak_history: Vec::new(),
        }
    }

    #[test]
    fn first_practice_starts_streak() {
        let (engine, _) = setup(None);
        let data = engine.record_practice();
        assert_eq!(data.current_streak, 1);
        assert_eq!(data.longest_streak, 1);
        assert!(engine.has_practiced_today());
    }

    #[test]
    fn same_day_practice_counts_once() {
        let (engine, _) = setup(None);
        engine.record_practice();
        let data = engine.record_practice();
        assert_eq!(data.current_streak, 1);
        assert_eq!(data.streak_history.len(), 1);
    }

    #[test]
    fn consecutive_days_extend_streak() {
        let (engine, clock) = setup(None);
        for _ in 0..3 {
            engine.record_practice();
            clock.advance(chrono::Duration::days(1));
        }
        assert_eq!(engine.current_streak(), 3);
        assert_eq!(engine.longest_streak(), 3);
    }

    #[test]
    fn one_missed_day_uses_freeze() {
        let (engine, _) = setup(Some(seeded(4, 8, 1)));
        let data = engine.streak_data();
        assert_eq!(data.current_streak, 4);
        assert_eq!(data.streak_freezes, 0);
        assert_eq!(
            data.streak_history,
            vec![StreakHistoryEntry {
                date: day(9),
                practiced: false,
                frozen_streak: Some(true),
            }]
        );

        // The bridged day counts as yesterday, so today continues the run.
        assert_eq!(engine.record_practice().current_streak, 5);
    }

    #[test]
    fn missed_day_without_freeze_resets() {
        let (engine, _) = setup(Some(seeded(4, 8, 0)));
        assert_eq!(engine.current_streak(), 0);
        assert_eq!(engine.longest_streak(), 4);
        assert_eq!(engine.record_practice().current_streak, 1);
    }

    #[test]
    fn longer_gap_resets_even_with_freezes() {
        let (engine, _) = setup(Some(seeded(4, 6, 3)));
        let data = engine.streak_data();
        assert_eq!(data.current_streak, 0);
        assert_eq!(data.streak_freezes, 3);
    }

    #[test]
    fn yesterday_keeps_streak_without_change() {
        let (engine, _) = setup(Some(seeded(2, 9, 0)));
        assert_eq!(engine.current_streak(), 2);
        assert!(!engine.has_practiced_today());
    }

    #[test]
    fn clock_moving_backwards_is_ignored() {
        let (engine, _) = setup(Some(seeded(2, 12, 0)));
        assert_eq!(engine.current_streak(), 2);
        assert_eq!(engine.record_practice().current_streak, 2);
    }

    #[test]
    fn monthly_history_filters_by_month() {
        let (engine, clock) = setup(None);
        engine.record_practice();
        clock.set(Utc.with_ymd_and_hms(2023, 6, 1, 9, 0, 0).unwrap());
        engine.record_practice();

        assert_eq!(engine.get_monthly_streak_history(2023, 5).len(), 1);
        assert_eq!(engine.get_monthly_streak_history(2023, 6).len(), 1);
        assert!(engine.get_monthly_streak_history(2023, 13).is_empty());
    }

    #[test]
    fn listeners_see_practice_events() {
        let (engine, _) = setup(None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.subscribe(move |e: &StreakChangeEvent| sink.lock().unwrap().push(e.kind));
        engine.record_practice();
        engine.record_practice();
        assert_eq!(*seen.lock().unwrap(), vec![StreakChangeKind::Practiced]);
    }

    #[test]
    fn reset_clears_progress_and_persists() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2023, 5, 10, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::new());
        store.set_item(STORAGE_KEY, &seeded(4, 9, 2)).unwrap();
        let engine = StreakEngine::new(store.clone(), clock, Arc::new(SilentAudio));
        engine.initialize().unwrap();
        assert_eq!(engine.record_practice().current_streak, 5);

        engine.reset_streak_data();
        assert_eq!(engine.streak_data(), StreakData::default());
        assert!(!engine.has_practiced_today());
        let persisted: StreakData = store.get_item(STORAGE_KEY).unwrap().unwrap();
        assert_eq!(persisted, StreakData::default());

        let data = engine.record_practice();
        assert_eq!(data.current_streak, 1);
        assert_eq!(data.longest_streak, 1);
    }
}
