pub mod config;
pub mod currency;
pub mod hearts;
pub mod services;
pub mod streak;

use dojo_core::{Config, Dojo};
use serde::Serialize;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Open the on-disk economy and bring its services up.
pub fn open_dojo() -> Result<Dojo, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut dojo = Dojo::open(config)?;
    dojo.startup()?;
    Ok(dojo)
}

pub fn print_json<T: Serialize>(value: &T) -> CommandResult {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
