use clap::Subcommand;
use dojo_core::{Config, Dojo};
use serde_json::json;

use super::{print_json, CommandResult};

#[derive(Subcommand)]
pub enum ServicesAction {
    /// Start every service and report its lifecycle status
    Status,
}

pub fn run(action: ServicesAction) -> CommandResult {
    match action {
        ServicesAction::Status => {
            let mut dojo = Dojo::open(Config::load()?)?;
            let report = dojo.startup()?;

            let services: Vec<_> = dojo
                .service_statuses()
                .into_iter()
                .map(|(name, status)| json!({ "name": name, "status": status }))
                .collect();
            print_json(&json!({
                "fully_up": report.is_fully_up(),
                "degraded": report.degraded,
                "services": services,
            }))?;

            dojo.shutdown();
        }
    }
    Ok(())
}
