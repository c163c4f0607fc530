//! miditone CLI - offline host for the miditone render kernel.

mod commands;
mod host;
mod score;
mod wav;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "miditone")]
#[command(author, version, about = "Render MIDI scores through the miditone kernel", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a score to a WAV file
    Render(commands::render::RenderArgs),

    /// Validate and list a sound bank
    Bank(commands::bank::BankArgs),

    /// Validate a score and print its summary
    Score(commands::score::ScoreArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Bank(args) => commands::bank::run(args),
        Commands::Score(args) => commands::score::run(args),
    }
}
