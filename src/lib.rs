//! Barn Broadcast Library
//!
//! Turns a broiler farm performance report (a CSV export with a two-row
//! header) into one short summary per barn, and delivers those summaries to
//! every registered Telegram subscriber.
//!
//! This library provides tools for:
//! - Locating the header of a report and decoding its two-level columns
//! - Flattening the header into stable column names
//! - Aggregating rows per barn, including feed totals across sub-rows
//! - Rendering and chunking summaries within the message size limit
//! - Broadcasting with a single rate-limit retry per delivery
//! - Registering subscribers through a long-polling command listener

pub mod aggregate;
pub mod broadcast;
pub mod chunker;
pub mod config;
pub mod constants;
pub mod error;
pub mod flatten;
pub mod format;
pub mod header;
pub mod listener;
pub mod models;
pub mod processor;
pub mod sequence;
pub mod store;
pub mod transport;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{Config, RunMode};
pub use error::{BarnError, Result};
pub use models::{BarnSummary, ReportTable, RunStats};
pub use processor::{ReportProcessor, prepare_report};
pub use store::{ReportStore, SqliteStore, SubscriberStore};
pub use transport::{TelegramClient, Transport};
