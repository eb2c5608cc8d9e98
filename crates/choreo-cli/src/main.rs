use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "choreo-cli", version, about = "Choreo CLI")]
struct Cli {
    /// Use this config file instead of ~/.config/choreo/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one attempt on the virtual clock and print its timeline
    Simulate(commands::simulate::SimulateArgs),
    /// Timing pattern catalog
    Patterns {
        #[command(subcommand)]
        action: commands::patterns::PatternsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Upload documents for analysis with live progress
    Audit(commands::audit::AuditArgs),
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args, config),
        Commands::Patterns { action } => commands::patterns::run(action, config),
        Commands::Config { action } => commands::config::run(action, config),
        Commands::Audit(args) => commands::audit::run(args, config),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
