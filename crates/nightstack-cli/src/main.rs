mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nightstack", about = "Deep-sky calibration and stacking pipeline")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for a target, reusing existing artifacts
    Run(commands::pipeline::RunArgs),
    /// Show which stages a run would build without running anything
    Plan(commands::plan::PlanArgs),
    /// List a target's sessions, filter configs and frame counts
    Sessions(commands::sessions::SessionsArgs),
    /// Print a default pipeline config as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::pipeline::run(args),
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Sessions(args) => commands::sessions::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
