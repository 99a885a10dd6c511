//! Application context wiring the engines together.

use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::{AudioPlayer, SilentAudio, TracingAudio};
use crate::catalog::{Reward, HEART_REFILL, STREAK_FREEZE};
use crate::clock::{Clock, SystemClock};
use crate::currency::{CurrencyData, CurrencyEngine};
use crate::error::Result;
use crate::hearts::HeartsEngine;
use crate::service::{Criticality, ServiceRegistry, ServiceStatus, StartupReport};
use crate::storage::{Config, KeyValueStore, SqliteStore};
use crate::streak::{StreakData, StreakEngine};

pub const CURRENCY_SERVICE: &str = "currency";
pub const HEARTS_SERVICE: &str = "hearts";
pub const STREAK_SERVICE: &str = "streak";

/// Startup order. Hearts depends on currency for paid refills.
const STARTUP_PLAN: [(&str, Criticality); 3] = [
    (CURRENCY_SERVICE, Criticality::Essential),
    (HEARTS_SERVICE, Criticality::Essential),
    (STREAK_SERVICE, Criticality::Optional),
];

/// Owns one instance of each engine plus the registry that manages them.
pub struct Dojo {
    currency: Arc<CurrencyEngine>,
    hearts: Arc<HeartsEngine>,
    streak: Arc<StreakEngine>,
    registry: ServiceRegistry,
    config: Config,
}

impl Dojo {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioPlayer>,
        config: Config,
    ) -> Self {
        let currency = Arc::new(CurrencyEngine::new(
            store.clone(),
            clock.clone(),
            audio.clone(),
        ));
        let hearts = HeartsEngine::new(
            store.clone(),
            clock.clone(),
            audio.clone(),
            currency.clone(),
            config.hearts_config(),
        );
        let streak = Arc::new(StreakEngine::new(store, clock, audio));

        let mut registry = ServiceRegistry::new();
        registry.register(CURRENCY_SERVICE, currency.clone());
        registry.register(HEARTS_SERVICE, hearts.clone());
        registry.register(STREAK_SERVICE, streak.clone());

        Self {
            currency,
            hearts,
            streak,
            registry,
            config,
        }
    }

    /// Production wiring: SQLite under the data directory and the wall clock.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn open(config: Config) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open()?);
        let audio: Arc<dyn AudioPlayer> = if config.audio.enabled {
            Arc::new(TracingAudio)
        } else {
            Arc::new(SilentAudio)
        };
        Ok(Self::new(store, Arc::new(SystemClock), audio, config))
    }

    /// Bring every service online. Streak failures degrade instead of aborting.
    ///
    /// # Errors
    /// Returns the first error from currency or hearts initialization.
    pub fn startup(&mut self) -> Result<StartupReport> {
        let report = self.registry.startup(&STARTUP_PLAN)?;
        info!(
            component = "Dojo",
            initialized = report.initialized.len(),
            degraded = report.degraded.len(),
            "Startup complete"
        );
        Ok(report)
    }

    /// Release every service in reverse initialization order.
    pub fn shutdown(&mut self) {
        self.registry.cleanup_all();
        info!(component = "Dojo", "Shutdown complete");
    }

    /// Use one owned power-up and apply its effect.
    ///
    /// Returns false, consuming nothing, for items without a redeem effect,
    /// items not owned, or a heart refill when hearts are already full.
    pub fn redeem_item(&self, item_id: &str) -> bool {
        match item_id {
            STREAK_FREEZE => {
                if !self.currency.use_item(item_id) {
                    return false;
                }
                self.streak.add_streak_freezes(1);
                true
            }
            HEART_REFILL => {
                let data = self.hearts.hearts_data();
                if data.current >= data.max || !self.currency.has_item(item_id) {
                    return false;
                }
                if !self.currency.use_item(item_id) {
                    return false;
                }
                self.hearts.add_hearts(data.max - data.current, "item_refill");
                true
            }
            other => {
                debug!(component = "Dojo", item = other, "Item has no redeem effect");
                false
            }
        }
    }

    /// Credit the gems for one rewarded activity.
    pub fn award(&self, reward: Reward) -> CurrencyData {
        debug!(component = "Dojo", reward = reward.as_str(), "Awarding gems");
        self.currency.add_currency(reward.amount(), reward.as_str(), None)
    }

    /// Record today's practice and pay the streak rewards for a new day.
    /// Repeat calls on the same day pay nothing.
    pub fn record_practice(&self) -> StreakData {
        let before = self.streak.streak_data().last_practice_date;
        let data = self.streak.record_practice();
        if data.last_practice_date != before {
            for reward in Reward::for_streak_day(data.current_streak) {
                self.award(reward);
            }
        }
        data
    }

    pub fn currency(&self) -> &Arc<CurrencyEngine> {
        &self.currency
    }

    pub fn hearts(&self) -> &Arc<HeartsEngine> {
        &self.hearts
    }

    pub fn streak(&self) -> &Arc<StreakEngine> {
        &self.streak
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service_statuses(&self) -> Vec<(String, ServiceStatus)> {
        self.registry.statuses()
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn dojo() -> Dojo {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap(),
        ));
        let mut dojo = Dojo::new(
            Arc::new(MemoryStore::new()),
            clock,
            Arc::new(SilentAudio),
            Config::default(),
        );
        dojo.startup().unwrap();
        dojo
    }

    #[test]
    fn startup_brings_all_services_up() {
        let mut dojo = dojo();
        assert!(dojo.registry().is_service_initialized(CURRENCY_SERVICE));
        assert!(dojo.registry().is_service_initialized(HEARTS_SERVICE));
        assert!(dojo.registry().is_service_initialized(STREAK_SERVICE));

        dojo.shutdown();
        assert!(dojo.registry().initialized_service_names().is_empty());
    }

    #[test]
    fn redeem_streak_freeze() {
        let dojo = dojo();
        dojo.currency().add_currency(30, "seed", None);
        assert!(dojo.currency().purchase_item(STREAK_FREEZE));

        assert!(dojo.redeem_item(STREAK_FREEZE));
        assert_eq!(dojo.streak().streak_freezes(), 1);
        assert!(!dojo.currency().has_item(STREAK_FREEZE));
        assert!(!dojo.redeem_item(STREAK_FREEZE));
    }

    #[test]
    fn redeem_heart_refill_needs_missing_hearts() {
        let dojo = dojo();
        dojo.currency().add_currency(20, "seed", None);
        assert!(dojo.currency().purchase_item(HEART_REFILL));

        assert!(!dojo.redeem_item(HEART_REFILL));
        assert_eq!(dojo.currency().get_item_quantity(HEART_REFILL), 1);

        dojo.hearts().use_hearts(3, "fail");
        assert!(dojo.redeem_item(HEART_REFILL));
        assert_eq!(dojo.hearts().current_hearts(), 5);
        assert_eq!(dojo.currency().balance(), 0);
    }

    #[test]
    fn award_records_reward_source() {
        let dojo = dojo();
        let data = dojo.award(Reward::Achievement);
        assert_eq!(data.balance, 20);
        assert_eq!(data.transactions[0].source, "achievement");
    }

    #[test]
    fn practice_pays_daily_reward_once() {
        let dojo = dojo();
        dojo.record_practice();
        dojo.record_practice();
        assert_eq!(dojo.currency().balance(), 5);
        assert_eq!(dojo.currency().get_transaction_history(None).len(), 1);
    }

    #[test]
    fn seventh_day_pays_weekly_bonus() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap(),
        ));
        let mut dojo = Dojo::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            Arc::new(SilentAudio),
            Config::default(),
        );
        dojo.startup().unwrap();

        for _ in 0..7 {
            dojo.record_practice();
            clock.advance(chrono::Duration::days(1));
        }
        assert_eq!(dojo.streak().current_streak(), 7);
        assert_eq!(dojo.currency().balance(), 7 * 5 + 15);
        let newest = &dojo.currency().get_transaction_history(Some(1))[0];
        assert_eq!(newest.source, "weekly_streak");
    }

    #[test]
    fn redeem_ignores_items_without_effect() {
        let dojo = dojo();
        dojo.currency().add_currency(50, "seed", None);
        assert!(dojo.currency().purchase_item("dark_theme"));
        assert!(!dojo.redeem_item("dark_theme"));
        assert!(dojo.currency().has_item("dark_theme"));
    }
}
