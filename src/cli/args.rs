//! Command-line argument definitions for barn-broadcast
//!
//! Global flags shape logging and storage for every subcommand; `report`
//! runs one broadcast pass and `listen` serves subscriber commands.

use crate::config::{Config, RunMode};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Broiler barn report broadcaster
///
/// Turns a farm performance report into per-barn summaries and sends them to
/// every registered Telegram subscriber.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "barn-broadcast",
    version,
    about = "Summarise broiler barn reports and broadcast them to Telegram subscribers"
)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Summarise a report and broadcast it to all subscribers
    Report(ReportArgs),
    /// Long-poll for /start and /broadcast commands
    Listen,
}

/// Flags shared by every subcommand
#[derive(Debug, Clone, ClapArgs)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose", global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    /// SQLite database for subscribers and report archives
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Print the message chunks without storing or sending anything
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
}

/// Arguments for the report command
#[derive(Debug, Clone, ClapArgs)]
pub struct ReportArgs {
    /// Where the report comes from
    #[arg(long = "mode", value_enum)]
    pub mode: Option<RunMode>,

    /// Report CSV file (required in manual mode)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Maximum characters per message
    #[arg(long = "chunk-budget", value_name = "CHARS")]
    pub chunk_budget: Option<usize>,
}

impl GlobalArgs {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Apply global overrides on top of the environment-derived config
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.db_path {
            config.db_path = path.clone();
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}

impl ReportArgs {
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(budget) = self.chunk_budget {
            config.chunk_budget = budget;
        }
    }
}
