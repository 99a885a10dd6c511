use clap::Subcommand;
use dojo_core::error::ConfigError;
use dojo_core::Config;
use serde_json::json;

use super::{print_json, CommandResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting as `{"key", "value"}` JSON
    Get {
        /// Dot-separated key (e.g. "hearts.max_hearts", "audio.enabled")
        key: String,
    },
    /// Change one setting; takes effect on the next command
    Set { key: String, value: String },
    /// Print the whole config as JSON
    List,
    /// Overwrite the config file with defaults
    Reset,
}

fn entry(config: &Config, key: String) -> CommandResult {
    match config.get_value(&key) {
        Some(value) => print_json(&json!({ "key": key, "value": value })),
        None => Err(ConfigError::UnknownKey(key).into()),
    }
}

pub fn run(action: ConfigAction) -> CommandResult {
    match action {
        ConfigAction::Get { key } => entry(&Config::load()?, key),
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            entry(&config, key)
        }
        ConfigAction::List => print_json(&Config::load()?),
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            print_json(&config)
        }
    }
}
