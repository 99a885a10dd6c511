use clap::{Subcommand, ValueEnum};
use dojo_core::HeartsEngine;
use serde_json::json;

use super::{open_dojo, print_json, CommandResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum HeartsAction {
    /// Print hearts and regeneration countdown as JSON
    Status,
    /// Spend hearts
    Use {
        #[arg(default_value = "1")]
        count: u32,
        #[arg(long, default_value = "cli")]
        reason: String,
    },
    /// Grant hearts, capped at max
    Add { count: u32 },
    /// Buy a full refill with gems
    Refill,
    /// Toggle premium (unlimited hearts)
    Premium {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Change heart capacity
    Max { count: u32 },
    /// Run a regeneration pass
    Reconcile,
}

fn status_json(hearts: &HeartsEngine) -> serde_json::Value {
    let data = hearts.hearts_data();
    json!({
        "current": data.current,
        "max": data.max,
        "is_premium": data.is_premium,
        "last_regeneration": data.last_regeneration,
        "next_regeneration_time": data.next_regeneration_time,
        "time_until_next_heart": hearts.format_time_until_next_heart(),
    })
}

pub fn run(action: HeartsAction) -> CommandResult {
    let mut dojo = open_dojo()?;
    let hearts = dojo.hearts().clone();

    let outcome: CommandResult = match action {
        HeartsAction::Status | HeartsAction::Reconcile => {
            hearts.reconcile();
            Ok(())
        }
        HeartsAction::Use { count, reason } => {
            if hearts.use_hearts(count, &reason) {
                Ok(())
            } else {
                Err(format!(
                    "not enough hearts: have {}, need {count}",
                    hearts.current_hearts()
                )
                .into())
            }
        }
        HeartsAction::Add { count } => {
            hearts.add_hearts(count, "cli");
            Ok(())
        }
        HeartsAction::Refill => {
            if hearts.refill_hearts() {
                Ok(())
            } else {
                Err("refill declined: hearts already full or not enough gems".into())
            }
        }
        HeartsAction::Premium { state } => {
            hearts.set_premium_status(matches!(state, Toggle::On));
            Ok(())
        }
        HeartsAction::Max { count } => {
            hearts.set_max_hearts(count);
            Ok(())
        }
    };

    let result = outcome.and_then(|()| print_json(&status_json(&hearts)));
    dojo.shutdown();
    result
}
