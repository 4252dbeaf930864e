//! Report command: one summarise-and-broadcast pass

use super::shared::{create_progress_bar, load_configuration, print_run_summary};
use crate::cli::args::{GlobalArgs, ReportArgs};
use crate::config::Config;
use crate::processor::{ReportProcessor, prepare_report, resolve_input};
use crate::store::SqliteStore;
use crate::transport::TelegramClient;
use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

pub async fn run_report(global: &GlobalArgs, args: &ReportArgs) -> Result<()> {
    let mut config = load_configuration(global)?;
    args.apply_to(&mut config);
    config.validate()?;

    let input = resolve_input(config.mode, args.file.as_deref())?;
    if config.dry_run {
        return run_dry(&config, input);
    }

    let token = config.require_token()?;
    let transport = TelegramClient::new(token)?;
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    let progress = create_progress_bar(global.quiet, "Broadcasting");
    let processor =
        ReportProcessor::new(&config, &transport, &store, &store).with_progress(progress.clone());

    let (stats, delivery) = processor
        .process(Some(input))
        .await
        .context("Report run failed")?;
    progress.finish_and_clear();

    if !delivery.is_complete() {
        println!(
            "{} {} deliveries failed; see the log for details",
            "Warning:".bright_yellow().bold(),
            delivery.failed()
        );
    }

    if !global.quiet {
        print_run_summary(&stats);
    }
    Ok(())
}

fn run_dry(config: &Config, input: &Path) -> Result<()> {
    let prepared = prepare_report(input, config.chunk_budget)
        .with_context(|| format!("Failed to prepare {}", input.display()))?;

    for (index, chunk) in prepared.chunks.iter().enumerate() {
        println!(
            "{}",
            format!(
                "── chunk {}/{} ({} chars) ──",
                index + 1,
                prepared.chunks.len(),
                chunk.chars().count()
            )
            .bright_yellow()
        );
        println!("{chunk}\n");
    }
    println!(
        "{} {} barns, {} chunks (dry run, nothing stored or sent)",
        "Prepared".bright_green().bold(),
        prepared.summaries.len(),
        prepared.chunks.len()
    );
    Ok(())
}
