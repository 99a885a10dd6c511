use clap::Subcommand;
use serde_json::json;

use super::{open_dojo, print_json, CommandResult};

#[derive(Subcommand)]
pub enum StreakAction {
    /// Print streak state as JSON
    Status,
    /// Record today's practice and collect its streak rewards
    Practice,
    /// Add streak freezes
    Freeze { count: u32 },
    /// History entries for one calendar month
    Month { year: i32, month: u32 },
}

pub fn run(action: StreakAction) -> CommandResult {
    let mut dojo = open_dojo()?;
    let streak = dojo.streak().clone();

    let result = match action {
        StreakAction::Status => print_json(&json!({
            "streak": streak.streak_data(),
            "practiced_today": streak.has_practiced_today(),
        })),
        StreakAction::Practice => print_json(&dojo.record_practice()),
        StreakAction::Freeze { count } => print_json(&streak.add_streak_freezes(count)),
        StreakAction::Month { year, month } => {
            print_json(&streak.get_monthly_streak_history(year, month))
        }
    };

    dojo.shutdown();
    result
}
