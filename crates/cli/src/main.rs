//! Perkharness CLI - Main Entry Point
//!
//! Starts the perks backend, waits for it to become healthy, runs the
//! integration test command against it and shuts it down again. Also
//! exposes the individual steps for debugging a stuck run.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{health, reap, run};

/// Perkharness - live-backend integration test harness
#[derive(Parser)]
#[command(name = "perkharness")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Dotenv file with harness defaults (process variables win)
    #[arg(long, default_value = "server/.env", global = true)]
    env_file: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the backend, run the tests against it, stop the backend
    Run(run::RunArgs),

    /// Wait for a running backend's health endpoint
    Health(health::HealthArgs),

    /// Remove a leftover test user from the database
    ReapUser(reap::ReapArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let code = run::execute(args, &cli.env_file, cli.format).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Health(args) => health::execute(args, cli.format).await?,
        Commands::ReapUser(args) => reap::execute(args, &cli.env_file).await?,
        Commands::Version => {
            println!("Perkharness CLI v{}", perkharness_common::VERSION);
            println!("Live-backend integration harness for the perks app");
        }
    }

    Ok(())
}
