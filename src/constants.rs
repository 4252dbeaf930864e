//! Application constants for the barn report pipeline
//!
//! Column labels and markers mirror the farm management export this tool
//! consumes; message limits mirror the Telegram Bot API.

// =============================================================================
// Report Layout
// =============================================================================

/// Substring that identifies the first of the two header rows
pub const HEADER_MARKER: &str = "House Code";

/// Flat column holding the barn identifier
pub const HOUSE_CODE_COLUMN: &str = "House Code";

/// Flat column holding the batch identifier
pub const BATCH_ID_COLUMN: &str = "Batch ID";

/// Batch column values that mark header remnants and footer rows
pub const BATCH_ID_JUNK_VALUES: &[&str] = &["Batch ID", "All Total"];

/// Pattern a barn code must match to be considered a real barn
pub const BARN_CODE_PATTERN: &str = r"^\d";

/// Auto-generated header labels start with this (compared case-insensitively)
pub const PLACEHOLDER_LABEL_PREFIX: &str = "unnamed";

/// Separator between top and sub label in a flat column name
pub const FLAT_NAME_SEPARATOR: &str = " | ";

/// Feed quantity columns start with this (compared case-insensitively)
pub const FEED_COLUMN_PREFIX: &str = "feed used (kg)";

/// Feed quantity columns contain this segment (compared case-insensitively)
pub const FEED_QTY_SEGMENT: &str = "| qty";

/// Scalar columns read from a barn's main row
pub mod columns {
    pub const BREED: &str = "Breed - Grade";
    pub const AGE_DAYS: &str = "Age Days";
    pub const CHICK_IN: &str = "Qty Chick In (no tolerancy) /Tot Order";
    pub const MORTALITY_DEAD: &str = "MORTALITY | Dead";
    pub const MORTALITY: &str = "MORTALITY";
    pub const AVG_BODY_WEIGHT: &str = "Avg BW";
    pub const FCR_ACTUAL: &str = "FCR | Act";
    pub const EEF_ACTUAL: &str = "EEF | Act";
}

/// Rendered in place of an absent FCR/EEF value
pub const ABSENT_INDEX_PLACEHOLDER: &str = "—";

/// Age rendered when the age column is blank
pub const DEFAULT_AGE_DAYS: &str = "0";

// =============================================================================
// Messaging
// =============================================================================

/// Hard message length limit imposed by the Telegram Bot API
pub const TELEGRAM_HARD_LIMIT: usize = 4096;

/// Default chunk budget, kept under the hard limit to leave room for markup
pub const DEFAULT_CHUNK_BUDGET: usize = 4000;

/// Separator placed between summary blocks inside a chunk
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Per-block overhead charged by the chunker for the separator
pub const BLOCK_SEPARATOR_OVERHEAD: usize = 2;

/// Default Telegram API base URL
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default long-poll timeout in seconds
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Default pause between long polls in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// =============================================================================
// Commands
// =============================================================================

/// Inbound command that registers the sender as a subscriber
pub const REGISTER_COMMAND: &str = "/start";

/// Inbound command prefix that relays the rest of the message to subscribers
pub const BROADCAST_COMMAND: &str = "/broadcast ";

/// Reply sent after a successful registration
pub const REGISTERED_REPLY: &str = "✅ Anda telah terdaftar untuk menerima broadcast!";

// =============================================================================
// Storage
// =============================================================================

/// Default SQLite file name
pub const DEFAULT_DB_FILE: &str = "subscribers.db";

/// Application directory name under the user data directory
pub const APP_DIR_NAME: &str = "barn-broadcast";

/// Table receiving the flattened report (replaced every run)
pub const RAW_TABLE: &str = "raw_data";

/// Table receiving rendered chunks (appended every run)
pub const SUMMARY_TABLE: &str = "summaries";
