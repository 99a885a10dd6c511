//! Static store catalog and reward amounts.

use serde::Serialize;
use std::str::FromStr;

/// Activities that grant Key Gems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reward {
    /// Daily practice reward.
    DailyStreak,
    /// Bonus on top of the daily reward every 7 streak days.
    WeeklyStreak,
    /// Bonus on top of the daily reward every 30 streak days.
    MonthlyStreak,
    LevelUp,
    Achievement,
    /// Lesson completed with 100% accuracy.
    PerfectLesson,
    ChallengeComplete,
}

impl Reward {
    pub const ALL: [Reward; 7] = [
        Reward::DailyStreak,
        Reward::WeeklyStreak,
        Reward::MonthlyStreak,
        Reward::LevelUp,
        Reward::Achievement,
        Reward::PerfectLesson,
        Reward::ChallengeComplete,
    ];

    pub fn amount(&self) -> i64 {
        match self {
            Self::DailyStreak => 5,
            Self::WeeklyStreak => 15,
            Self::MonthlyStreak => 50,
            Self::LevelUp => 10,
            Self::Achievement => 20,
            Self::PerfectLesson => 3,
            Self::ChallengeComplete => 5,
        }
    }

    /// Transaction source recorded for this reward.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyStreak => "daily_streak",
            Self::WeeklyStreak => "weekly_streak",
            Self::MonthlyStreak => "monthly_streak",
            Self::LevelUp => "level_up",
            Self::Achievement => "achievement",
            Self::PerfectLesson => "perfect_lesson",
            Self::ChallengeComplete => "challenge_complete",
        }
    }

    /// Streak bonuses earned by reaching `streak` days, daily reward first.
    pub fn for_streak_day(streak: u32) -> Vec<Reward> {
        let mut rewards = vec![Reward::DailyStreak];
        if streak > 0 && streak % 7 == 0 {
            rewards.push(Reward::WeeklyStreak);
        }
        if streak > 0 && streak % 30 == 0 {
            rewards.push(Reward::MonthlyStreak);
        }
        rewards
    }
}

impl FromStr for Reward {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reward::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown reward: {s}"))
    }
}

pub const STREAK_FREEZE: &str = "streak_freeze";
pub const HEART_REFILL: &str = "heart_refill";
pub const XP_BOOST: &str = "xp_boost";
pub const DARK_THEME: &str = "dark_theme";
pub const RETRO_THEME: &str = "retro_theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ItemCategory {
    PowerUp,
    /// Time-boxed effect; `duration_ms` is how long one purchase lasts.
    Boost { duration_ms: i64 },
    /// Purely visual. `one_time` items cannot be bought again while owned.
    Cosmetic { one_time: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreItem {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price: u64,
    #[serde(flatten)]
    pub category: ItemCategory,
    pub icon: &'static str,
}

impl StoreItem {
    pub fn is_one_time(&self) -> bool {
        matches!(self.category, ItemCategory::Cosmetic { one_time: true })
    }

    pub fn boost_duration_ms(&self) -> Option<i64> {
        match self.category {
            ItemCategory::Boost { duration_ms } => Some(duration_ms),
            _ => None,
        }
    }
}

const HOUR_MS: i64 = 60 * 60 * 1000;

static CATALOG: [StoreItem; 5] = [
    StoreItem {
        id: STREAK_FREEZE,
        name: "Streak Freeze",
        description: "Prevents your streak from breaking if you miss a day",
        price: 30,
        category: ItemCategory::PowerUp,
        icon: "AcUnit",
    },
    StoreItem {
        id: HEART_REFILL,
        name: "Heart Refill",
        description: "Refill all your hearts immediately",
        price: 20,
        category: ItemCategory::PowerUp,
        icon: "Favorite",
    },
    StoreItem {
        id: XP_BOOST,
        name: "XP Boost",
        description: "Earn double XP for the next 24 hours",
        price: 40,
        category: ItemCategory::Boost {
            duration_ms: 24 * HOUR_MS,
        },
        icon: "Speed",
    },
    StoreItem {
        id: DARK_THEME,
        name: "Dark IDE Theme",
        description: "A sleek dark theme for the IDE simulator",
        price: 50,
        category: ItemCategory::Cosmetic { one_time: true },
        icon: "DarkMode",
    },
    StoreItem {
        id: RETRO_THEME,
        name: "Retro Terminal Theme",
        description: "Old-school terminal look for the IDE simulator",
        price: 75,
        category: ItemCategory::Cosmetic { one_time: true },
        icon: "Terminal",
    },
];

/// Every purchasable item, in display order.
pub fn catalog() -> &'static [StoreItem] {
    &CATALOG
}

pub fn find_item(id: &str) -> Option<&'static StoreItem> {
    CATALOG.iter().find(|item| item.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        let mut ids: Vec<_> = catalog().iter().map(|i| i.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog().len());
    }

    #[test]
    fn xp_boost_lasts_a_day() {
        let item = find_item(XP_BOOST).unwrap();
        assert_eq!(item.price, 40);
        assert_eq!(item.boost_duration_ms(), Some(24 * HOUR_MS));
        assert!(!item.is_one_time());
    }

    #[test]
    fn themes_are_one_time() {
        assert!(find_item(DARK_THEME).unwrap().is_one_time());
        assert!(find_item(RETRO_THEME).unwrap().is_one_time());
        assert!(!find_item(STREAK_FREEZE).unwrap().is_one_time());
        assert!(find_item("gold_keyboard").is_none());
    }

    #[test]
    fn serializes_category_inline() {
        let json = serde_json::to_value(find_item(XP_BOOST).unwrap()).unwrap();
        assert_eq!(json["category"], "boost");
        assert_eq!(json["duration_ms"], 24 * HOUR_MS);
    }

    #[test]
    fn reward_ids_parse_back() {
        for reward in Reward::ALL {
            assert_eq!(reward.as_str().parse::<Reward>(), Ok(reward));
            assert!(reward.amount() > 0);
        }
        assert!("jackpot".parse::<Reward>().is_err());
        assert_eq!(Reward::PerfectLesson.amount(), 3);
    }

    #[test]
    fn streak_milestones_add_bonuses() {
        assert_eq!(Reward::for_streak_day(1), vec![Reward::DailyStreak]);
        assert_eq!(
            Reward::for_streak_day(14),
            vec![Reward::DailyStreak, Reward::WeeklyStreak]
        );
        assert_eq!(
            Reward::for_streak_day(30),
            vec![Reward::DailyStreak, Reward::MonthlyStreak]
        );
        assert_eq!(
            Reward::for_streak_day(210),
            vec![Reward::DailyStreak, Reward::WeeklyStreak, Reward::MonthlyStreak]
        );
    }
}
