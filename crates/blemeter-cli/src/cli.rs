//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

const AUTO_OFF_HELP: &str = "\
To disable auto power off:
  * TS04: hold FUNC during power on
  * AN9002 / ZT300AB: hold SEL during power on
  * UT383BT: hold HOLD during power on
  * WT81B: hold POWER during power on (hold MODE and HOLD to toggle Bluetooth)";

#[derive(Debug, Parser)]
#[command(name = "blemeter")]
#[command(author, version, about = "Logger for Bluetooth LCD-mirror meters", long_about = None)]
#[command(after_help = AUTO_OFF_HELP)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan for nearby supported meters
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long, default_value = "10")]
        timeout: u64,
    },

    /// List supported meter models
    Models,

    /// Connect to meters and log their readings until stopped with ^C
    Log(LogArgs),
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// TOML file describing the meters and logging mode; auto-detects meters if omitted
    #[arg(short, long, value_name = "meters.toml")]
    pub config: Option<PathBuf>,

    /// File to log to instead of stdout; must not exist yet
    #[arg(short, long, value_name = "log.tsv")]
    pub output: Option<PathBuf>,

    /// Record format (overrides the config file)
    #[arg(short, long, value_enum)]
    pub format: Option<RecordFormat>,
}

/// How records are written.
///
/// The spreadsheet dialect names `excel-tab` and `excel` are accepted for
/// TSV and CSV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// Tab-separated values
    #[default]
    #[serde(alias = "excel-tab")]
    #[value(alias = "excel-tab")]
    Tsv,
    /// Comma-separated values, quoted only where needed
    #[serde(alias = "excel")]
    #[value(alias = "excel")]
    Csv,
    /// Comma-separated values with every field quoted
    Unix,
    /// One JSON object per line
    Json,
}
