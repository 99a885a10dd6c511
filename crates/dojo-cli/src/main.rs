use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "dojo-cli", version, about = "Keyboard Dojo CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Key Gems balance, store and inventory
    Currency {
        #[command(subcommand)]
        action: commands::currency::CurrencyAction,
    },
    /// Hearts and regeneration
    Hearts {
        #[command(subcommand)]
        action: commands::hearts::HeartsAction,
    },
    /// Daily practice streak
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Service lifecycle diagnostics
    Services {
        #[command(subcommand)]
        action: commands::services::ServicesAction,
    },
}

fn init_tracing() {
    // Logs go to stderr so stdout stays machine-readable.
    let filter = EnvFilter::try_from_env("DOJO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Currency { action } => commands::currency::run(action),
        Commands::Hearts { action } => commands::hearts::run(action),
        Commands::Streak { action } => commands::streak::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Services { action } => commands::services::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
