//! Key Gem economy: balance, transaction ledger, inventory and timed boosts.
//!
//! Every earn/spend path persists the whole account and notifies listeners
//! exactly once. Policy failures (insufficient balance, unknown item, one-time
//! item already owned) are reported as `false` and logged; they never error.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::audio::{AudioPlayer, SoundCue};
use crate::catalog;
use crate::clock::Clock;
use crate::error::Result;
use crate::events::CurrencyChangeEvent;
use crate::observer::{ListenerId, Listeners};
use crate::service::{Service, ServiceStatus, StatusCell};
use crate::storage::{KeyValueStore, KeyValueStoreExt};

pub const STORAGE_KEY: &str = "user-currency";

const COMPONENT: &str = "CurrencyEngine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earn,
    Spend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    /// Positive for earnings, negative for spending.
    pub amount: i64,
    pub kind: TransactionKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub quantity: u32,
    pub purchase_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BoostWindow {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.end_time
    }
}

/// The persisted account document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyData {
    pub balance: u64,
    pub total_earned: u64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub inventory: BTreeMap<String, InventoryEntry>,
    #[serde(default)]
    pub active_boosts: BTreeMap<String, BoostWindow>,
}

pub struct CurrencyEngine {
    data: Mutex<CurrencyData>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    audio: Arc<dyn AudioPlayer>,
    listeners: Listeners<CurrencyChangeEvent>,
    status: StatusCell,
}

impl CurrencyEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            data: Mutex::new(CurrencyData::default()),
            store,
            clock,
            audio,
            listeners: Listeners::new(COMPONENT),
            status: StatusCell::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CurrencyData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> Result<CurrencyData> {
        match self.store.get_item::<CurrencyData>(STORAGE_KEY) {
            Ok(data) => Ok(data.unwrap_or_default()),
            Err(e) if e.is_decode() => {
                warn!(component = COMPONENT, error = %e, "Stored currency data unreadable, using defaults");
                Ok(CurrencyData::default())
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, data: &CurrencyData) {
        if let Err(e) = self.store.set_item(STORAGE_KEY, data) {
            error!(component = COMPONENT, error = %e, "Failed to save currency data");
        }
    }

    // ── Earning and spending ─────────────────────────────────────────

    /// Credit `amount` gems. Non-positive amounts, and amounts that would
    /// overflow the totals, leave the account untouched.
    pub fn add_currency(&self, amount: i64, source: &str, description: Option<&str>) -> CurrencyData {
        if amount <= 0 {
            return self.lock().clone();
        }

        let (snapshot, event) = {
            let mut data = self.lock();
            let old_balance = data.balance;
            let gained = amount as u64;
            let (Some(balance), Some(total_earned)) = (
                data.balance.checked_add(gained),
                data.total_earned.checked_add(gained),
            ) else {
                warn!(component = COMPONENT, amount, source, "Earn would overflow the account, ignored");
                return data.clone();
            };
            data.balance = balance;
            data.total_earned = total_earned;
            data.transactions.push(Transaction {
                timestamp: self.clock.now(),
                amount,
                kind: TransactionKind::Earn,
                source: source.to_string(),
                description: description.map(str::to_string),
            });
            self.save(&data);

            let event = CurrencyChangeEvent {
                old_balance,
                new_balance: data.balance,
                change: amount,
                source: source.to_string(),
            };
            (data.clone(), event)
        };

        self.audio.play(SoundCue::Coin);
        self.listeners.notify(&event);
        snapshot
    }

    /// Debit `amount` gems. A non-positive amount is a free no-op that succeeds;
    /// an amount above the balance fails without touching anything.
    pub fn spend_currency(&self, amount: i64, source: &str, description: Option<&str>) -> bool {
        let event = {
            let mut data = self.lock();
            match self.debit(&mut data, amount, source, description) {
                Debit::Free => return true,
                Debit::Insufficient => return false,
                Debit::Done(event) => {
                    self.save(&data);
                    event
                }
            }
        };

        self.listeners.notify(&event);
        true
    }

    fn debit(
        &self,
        data: &mut CurrencyData,
        amount: i64,
        source: &str,
        description: Option<&str>,
    ) -> Debit {
        if amount <= 0 {
            return Debit::Free;
        }
        let cost = amount as u64;
        if data.balance < cost {
            return Debit::Insufficient;
        }

        let old_balance = data.balance;
        data.balance -= cost;
        data.transactions.push(Transaction {
            timestamp: self.clock.now(),
            amount: -amount,
            kind: TransactionKind::Spend,
            source: source.to_string(),
            description: description.map(str::to_string),
        });

        Debit::Done(CurrencyChangeEvent {
            old_balance,
            new_balance: data.balance,
            change: -amount,
            source: source.to_string(),
        })
    }

    // ── Store and inventory ──────────────────────────────────────────

    /// Buy one unit of a catalog item.
    ///
    /// Boost purchases (re)start the boost window at now; buying again resets
    /// the timer instead of stacking it.
    pub fn purchase_item(&self, item_id: &str) -> bool {
        let Some(item) = catalog::find_item(item_id) else {
            error!(component = COMPONENT, item_id, "Item not found in store");
            return false;
        };

        let event = {
            let mut guard = self.lock();
            let data = &mut *guard;

            let owned = data.inventory.get(item_id).is_some_and(|e| e.quantity > 0);
            if item.is_one_time() && owned {
                error!(component = COMPONENT, item_id, "One-time item already owned");
                return false;
            }

            let description = format!("Purchased {}", item.name);
            let event = match self.debit(data, item.price as i64, "item_purchase", Some(&description)) {
                Debit::Insufficient => {
                    warn!(
                        component = COMPONENT,
                        item_id,
                        price = item.price,
                        balance = data.balance,
                        "Insufficient balance for purchase"
                    );
                    return false;
                }
                Debit::Free => None,
                Debit::Done(event) => Some(event),
            };

            let now = self.clock.now();
            let boost_end = item
                .boost_duration_ms()
                .map(|ms| now + Duration::milliseconds(ms));

            let entry = data
                .inventory
                .entry(item_id.to_string())
                .or_insert_with(|| InventoryEntry {
                    quantity: 0,
                    purchase_date: now,
                    expiry_date: None,
                });
            entry.quantity += 1;

            if let Some(end_time) = boost_end {
                entry.expiry_date = Some(end_time);
                data.active_boosts.insert(
                    item_id.to_string(),
                    BoostWindow {
                        start_time: now,
                        end_time,
                    },
                );
            }

            self.save(data);
            event
        };

        if let Some(event) = event {
            self.listeners.notify(&event);
        }
        self.audio.play(SoundCue::Purchase);
        info!(component = COMPONENT, item_id, "Item purchased");
        true
    }

    /// Consume one owned unit. The entry is removed when it reaches zero.
    pub fn use_item(&self, item_id: &str) -> bool {
        let mut data = self.lock();
        let Some(entry) = data.inventory.get_mut(item_id).filter(|e| e.quantity > 0) else {
            return false;
        };

        entry.quantity -= 1;
        if entry.quantity == 0 {
            data.inventory.remove(item_id);
        }
        self.save(&data);
        true
    }

    pub fn has_item(&self, item_id: &str) -> bool {
        self.get_item_quantity(item_id) > 0
    }

    pub fn get_item_quantity(&self, item_id: &str) -> u32 {
        self.lock()
            .inventory
            .get(item_id)
            .map(|e| e.quantity)
            .unwrap_or(0)
    }

    pub fn inventory(&self) -> BTreeMap<String, InventoryEntry> {
        self.lock().inventory.clone()
    }

    // ── Boosts ───────────────────────────────────────────────────────

    pub fn is_boost_active(&self, boost_id: &str) -> bool {
        let now = self.clock.now();
        self.lock()
            .active_boosts
            .get(boost_id)
            .is_some_and(|b| b.is_active_at(now))
    }

    /// Milliseconds left on a boost, zero when absent or expired.
    pub fn get_boost_remaining_time(&self, boost_id: &str) -> i64 {
        let now = self.clock.now();
        self.lock()
            .active_boosts
            .get(boost_id)
            .map(|b| (b.end_time - now).num_milliseconds().max(0))
            .unwrap_or(0)
    }

    /// Drop expired boost windows, persisting only when something changed.
    pub fn cleanup_expired_boosts(&self) {
        let mut data = self.lock();
        self.prune_boosts(&mut data);
    }

    fn prune_boosts(&self, data: &mut CurrencyData) {
        let now = self.clock.now();
        let before = data.active_boosts.len();
        data.active_boosts.retain(|_, b| b.is_active_at(now));
        if data.active_boosts.len() != before {
            self.save(data);
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Account snapshot with expired boosts already pruned.
    pub fn currency_data(&self) -> CurrencyData {
        let mut data = self.lock();
        self.prune_boosts(&mut data);
        data.clone()
    }

    pub fn balance(&self) -> u64 {
        self.lock().balance
    }

    pub fn total_earned(&self) -> u64 {
        self.lock().total_earned
    }

    /// Transactions newest first, truncated to `limit` when given.
    pub fn get_transaction_history(&self, limit: Option<usize>) -> Vec<Transaction> {
        let data = self.lock();
        let newest_first = data.transactions.iter().rev().cloned();
        match limit {
            Some(n) if n > 0 => newest_first.take(n).collect(),
            _ => newest_first.collect(),
        }
    }

    pub fn reset_currency(&self) {
        let mut data = self.lock();
        *data = CurrencyData::default();
        self.save(&data);
        info!(component = COMPONENT, "Currency data reset");
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CurrencyChangeEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

enum Debit {
    Free,
    Insufficient,
    Done(CurrencyChangeEvent),
}

impl Service for CurrencyEngine {
    fn initialize(&self) -> Result<()> {
        if !self.status.begin() {
            return Ok(());
        }

        match self.load() {
            Ok(loaded) => {
                *self.lock() = loaded;
                self.status.succeed();
                info!(component = COMPONENT, "Currency service initialized");
                Ok(())
            }
            Err(e) => {
                error!(component = COMPONENT, error = %e, "Failed to initialize currency service");
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
        info!(component = COMPONENT, "Currency service cleaned up");
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
