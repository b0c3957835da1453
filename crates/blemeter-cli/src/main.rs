//! Command-line logger for Bluetooth LCD-mirror meters.

mod cli;
mod commands;
mod config;
mod format;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Records go to stdout, so diagnostics stay on stderr
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan { timeout } => commands::cmd_scan(timeout, cli.quiet).await,
        Commands::Models => commands::cmd_models(),
        Commands::Log(args) => commands::cmd_log(args, cli.quiet).await,
    }
}
