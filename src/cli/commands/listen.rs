//! Listen command: serve /start and /broadcast until interrupted

use super::shared::load_configuration;
use crate::cli::args::GlobalArgs;
use crate::listener::Listener;
use crate::store::SqliteStore;
use crate::transport::TelegramClient;
use anyhow::{Context, Result};
use colored::*;
use tokio_util::sync::CancellationToken;

pub async fn run_listen(global: &GlobalArgs, cancel: CancellationToken) -> Result<()> {
    let config = load_configuration(global)?;
    config.validate()?;

    let token = config.require_token()?;
    let transport = TelegramClient::new(token)?;
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    if !global.quiet {
        println!(
            "{} (database: {})",
            "Listening for subscriber commands".bright_green().bold(),
            config.db_path.display()
        );
    }

    let mut listener = Listener::new(
        &transport,
        &store,
        config.poll_timeout(),
        config.poll_interval(),
    );
    let stats = listener.run(cancel).await.context("Listener stopped")?;

    if !global.quiet {
        println!(
            "  {} {}  {} {}",
            "Updates:".bright_cyan(),
            stats.updates_seen,
            "New subscribers:".bright_cyan(),
            stats.registrations
        );
    }
    Ok(())
}
