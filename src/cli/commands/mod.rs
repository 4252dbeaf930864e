//! Command implementations for the barn-broadcast CLI
//!
//! Each subcommand lives in its own module; shared setup (logging,
//! configuration layering, progress bars) is in `shared`.

pub mod listen;
pub mod report;
pub mod shared;

use crate::cli::args::{Args, Commands};
use crate::error::BarnError;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Dispatch to the selected subcommand
///
/// A report run is abandoned when `cancel` fires; the listener stops
/// polling and returns normally.
pub async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    shared::setup_logging(&args.global);

    match &args.command {
        Some(Commands::Report(report_args)) => {
            tokio::select! {
                result = report::run_report(&args.global, report_args) => result,
                _ = cancel.cancelled() => Err(BarnError::interrupted("report run cancelled by user").into()),
            }
        }
        Some(Commands::Listen) => listen::run_listen(&args.global, cancel).await,
        None => Ok(()),
    }
}
