//! Shared components for CLI commands

use crate::cli::args::GlobalArgs;
use crate::config::Config;
use crate::models::RunStats;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use tracing::{debug, info};

/// Set up structured logging on stderr
pub fn setup_logging(args: &GlobalArgs) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("barn_broadcast={}", log_level)));

    // try_init: a second initialisation (tests, embedding) is not an error
    if args.quiet {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Load configuration using the layered approach (defaults -> env -> args)
pub fn load_configuration(args: &GlobalArgs) -> Result<Config> {
    info!("Loading configuration");

    let mut config = Config::from_env().context("Failed to read configuration from environment")?;
    args.apply_to(&mut config);

    debug!("Database: {}", config.db_path.display());
    Ok(config)
}

/// Progress bar for a broadcast pass, hidden when stderr is not a terminal
pub fn create_progress_bar(quiet: bool, message: &str) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Print the end-of-run summary
pub fn print_run_summary(stats: &RunStats) {
    println!("\n{}", "Report broadcast complete".bright_green().bold());
    println!(
        "  {} {}",
        "Data rows:".bright_cyan(),
        stats.data_rows.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Barns summarised:".bright_cyan(),
        stats.barns_summarised.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Message chunks:".bright_cyan(),
        stats.chunks.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Subscribers:".bright_cyan(),
        stats.subscribers.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Delivered:".bright_cyan(),
        stats.deliveries_succeeded.to_string().bright_green()
    );
    if stats.deliveries_failed > 0 {
        println!(
            "  {} {}",
            "Failed:".bright_cyan(),
            stats.deliveries_failed.to_string().bright_red()
        );
    }
    println!(
        "  {} {:.2}s",
        "Time:".bright_cyan(),
        stats.processing_time_ms as f64 / 1000.0
    );
}
