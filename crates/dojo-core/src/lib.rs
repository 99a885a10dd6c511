//! # Keyboard Dojo Core Library
//!
//! The engagement economy behind the Keyboard Dojo shortcut trainer. Every
//! operation is available through the standalone `dojo-cli` binary; a GUI
//! shell is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Engines**: `CurrencyEngine`, `HeartsEngine` and `StreakEngine` each own
//!   one persisted JSON document and notify their own listeners on change
//! - **Storage**: SQLite key-value documents and TOML-based configuration
//! - **Services**: a registry that brings engines up in dependency order and
//!   tears them down in reverse
//! - **Time**: all time is read through an injected [`Clock`], so hearts
//!   regeneration and streak gaps are reconciled rather than timed
//!
//! ## Key Components
//!
//! - [`Dojo`]: Application context owning the engines and the registry
//! - [`CurrencyEngine`]: Key Gems balance, store purchases, inventory and boosts
//! - [`HeartsEngine`]: Consumable lives with time-based regeneration
//! - [`StreakEngine`]: Daily practice streaks with freeze tokens
//! - [`ServiceRegistry`]: Named service lifecycle management

pub mod audio;
pub mod catalog;
pub mod clock;
pub mod currency;
pub mod dojo;
pub mod error;
pub mod events;
pub mod hearts;
pub mod observer;
pub mod service;
pub mod storage;
pub mod streak;

pub use audio::{AudioPlayer, SilentAudio, SoundCue, TracingAudio};
pub use catalog::{catalog, find_item, ItemCategory, Reward, StoreItem};
pub use clock::{Clock, ManualClock, SystemClock};
pub use currency::{CurrencyData, CurrencyEngine, InventoryEntry, Transaction, TransactionKind};
pub use dojo::Dojo;
pub use error::{ConfigError, CoreError, ServiceError, StorageError};
pub use events::{CurrencyChangeEvent, HeartsChangeEvent, StreakChangeEvent, StreakChangeKind};
pub use hearts::{HeartsConfig, HeartsData, HeartsEngine};
pub use observer::ListenerId;
pub use service::{Criticality, Service, ServiceRegistry, ServiceStatus, StartupReport};
pub use storage::{Config, KeyValueStore, KeyValueStoreExt, MemoryStore, SqliteStore};
pub use streak::{StreakData, StreakEngine, StreakHistoryEntry};
