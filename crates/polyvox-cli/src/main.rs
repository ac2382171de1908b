//! Polyvox CLI - run, inspect and bounce polyphonic units.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polyvox")]
#[command(author, version, about = "Polyvox polyphonic engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a configured unit on the system audio device
    Run(commands::run::RunArgs),

    /// Render notes offline into a WAV file
    Bounce(commands::bounce::BounceArgs),

    /// List the parameters of a configured unit
    Params(commands::params::ParamsArgs),

    /// Print the JSON interface description of a configured unit
    Json(commands::json::JsonArgs),

    /// List registered units
    Units,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Bounce(args) => commands::bounce::run(args),
        Commands::Params(args) => commands::params::run(args),
        Commands::Json(args) => commands::json::run(args),
        Commands::Units => commands::units::run(),
    }
}
