use clap::Subcommand;
use dojo_core::{catalog, Reward};
use serde_json::json;

use super::{open_dojo, print_json, CommandResult};

#[derive(Subcommand)]
pub enum CurrencyAction {
    /// Print balance, inventory and boosts as JSON
    Balance,
    /// Credit gems
    Earn {
        amount: u64,
        /// Where the gems came from (e.g. "lesson_complete")
        source: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Credit the gems for a rewarded activity (e.g. "perfect_lesson")
    Award { reward: String },
    /// Debit gems
    Spend {
        amount: u64,
        source: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Buy one unit of a store item
    Buy {
        /// Catalog item ID (see `currency store`)
        item: String,
    },
    /// Consume one owned item without applying it
    Use { item: String },
    /// Consume one owned power-up and apply its effect
    Redeem { item: String },
    /// Transaction history, newest first
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the store catalog
    Store,
    /// Wipe balance, history and inventory
    Reset,
}

pub fn run(action: CurrencyAction) -> CommandResult {
    let mut dojo = open_dojo()?;
    let currency = dojo.currency().clone();

    let result = match action {
        CurrencyAction::Balance => print_json(&currency.currency_data()),
        CurrencyAction::Earn {
            amount,
            source,
            description,
        } => {
            let data = currency.add_currency(i64::try_from(amount)?, &source, description.as_deref());
            print_json(&json!({ "balance": data.balance, "total_earned": data.total_earned }))
        }
        CurrencyAction::Award { reward } => match reward.parse::<Reward>() {
            Ok(reward) => {
                let data = dojo.award(reward);
                print_json(&json!({
                    "reward": reward,
                    "amount": reward.amount(),
                    "balance": data.balance,
                    "total_earned": data.total_earned,
                }))
            }
            Err(e) => Err(e.into()),
        },
        CurrencyAction::Spend {
            amount,
            source,
            description,
        } => {
            if currency.spend_currency(i64::try_from(amount)?, &source, description.as_deref()) {
                print_json(&json!({ "balance": currency.balance() }))
            } else {
                Err(format!("insufficient balance: have {}, need {amount}", currency.balance()).into())
            }
        }
        CurrencyAction::Buy { item } => {
            if catalog::find_item(&item).is_none() {
                Err(format!("unknown item: {item}").into())
            } else if currency.purchase_item(&item) {
                print_json(&json!({
                    "item": item,
                    "quantity": currency.get_item_quantity(&item),
                    "balance": currency.balance(),
                }))
            } else {
                Err(format!("purchase of {item} declined").into())
            }
        }
        CurrencyAction::Use { item } => {
            if currency.use_item(&item) {
                print_json(&json!({ "item": item, "quantity": currency.get_item_quantity(&item) }))
            } else {
                Err(format!("no {item} in inventory").into())
            }
        }
        CurrencyAction::Redeem { item } => {
            if dojo.redeem_item(&item) {
                print_json(&json!({
                    "item": item,
                    "quantity": currency.get_item_quantity(&item),
                    "hearts": dojo.hearts().current_hearts(),
                    "streak_freezes": dojo.streak().streak_freezes(),
                }))
            } else {
                Err(format!("{item} cannot be redeemed right now").into())
            }
        }
        CurrencyAction::History { limit } => print_json(&currency.get_transaction_history(limit)),
        CurrencyAction::Reset => {
            currency.reset_currency();
            print_json(&currency.currency_data())
        }
        CurrencyAction::Store => print_json(&catalog::catalog()),
    };

    dojo.shutdown();
    result
}
