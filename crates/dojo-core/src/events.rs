use serde::{Deserialize, Serialize};

/// Delivered to currency listeners after every earn or spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyChangeEvent {
    pub old_balance: u64,
    pub new_balance: u64,
    /// Signed delta: positive on earn, negative on spend.
    pub change: i64,
    pub source: String,
}

/// Delivered to hearts listeners whenever the heart count actually moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartsChangeEvent {
    pub old_hearts: u32,
    pub new_hearts: u32,
    pub change: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChangeKind {
    /// A practice day was recorded.
    Practiced,
    /// A freeze bridged a missed day.
    Frozen,
    /// An uncovered gap broke the streak.
    Reset,
}

/// Delivered to streak listeners on practice, freeze use and reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakChangeEvent {
    pub old_streak: u32,
    pub new_streak: u32,
    pub kind: StreakChangeKind,
}
