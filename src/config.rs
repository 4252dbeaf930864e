//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then a `.env` file and the process
//! environment, then command-line overrides applied by the CLI. The finished
//! [`Config`] is passed explicitly into the pipeline and the listener.

use crate::constants::{
    APP_DIR_NAME, DEFAULT_CHUNK_BUDGET, DEFAULT_DB_FILE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_POLL_TIMEOUT_SECS, TELEGRAM_HARD_LIMIT,
};
use crate::error::{BarnError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_DB_PATH: &str = "DB_PATH";
pub const ENV_MODE: &str = "BARN_MODE";
pub const ENV_CHUNK_BUDGET: &str = "CHUNK_BUDGET";

/// Where the report comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Read a report file named on the command line
    #[default]
    Manual,
    /// Fetch the report from the farm portal (not available yet)
    Auto,
}

impl std::str::FromStr for RunMode {
    type Err = BarnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            other => Err(BarnError::configuration(format!(
                "Unknown mode '{other}' (expected 'manual' or 'auto')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bot API token; only the transport needs it
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,

    /// SQLite database holding subscribers, raw data and summaries
    pub db_path: PathBuf,

    pub mode: RunMode,

    /// Maximum characters per message chunk
    pub chunk_budget: usize,

    /// Long-poll timeout for inbound updates
    pub poll_timeout_secs: u64,

    /// Pause between polls
    pub poll_interval_ms: u64,

    /// Print the chunks instead of storing and sending them
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            db_path: Self::default_db_path(),
            mode: RunMode::Manual,
            chunk_budget: DEFAULT_CHUNK_BUDGET,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            dry_run: false,
        }
    }
}

impl Config {
    /// `<data dir>/barn-broadcast/subscribers.db`, or the working directory
    /// when the platform has no data directory
    pub fn default_db_path() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(DEFAULT_DB_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
    }

    /// Defaults overlaid with `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup
    ///
    /// Blank values are treated as unset.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = get(ENV_BOT_TOKEN) {
            self.bot_token = Some(token.trim().to_string());
        }
        if let Some(path) = get(ENV_DB_PATH) {
            self.db_path = PathBuf::from(path.trim());
        }
        if let Some(mode) = get(ENV_MODE) {
            self.mode = mode.parse()?;
        }
        if let Some(budget) = get(ENV_CHUNK_BUDGET) {
            self.chunk_budget = budget.trim().parse().map_err(|_| {
                BarnError::configuration(format!(
                    "{ENV_CHUNK_BUDGET} must be a positive integer, got '{budget}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_budget == 0 {
            return Err(BarnError::configuration("Chunk budget must be greater than zero"));
        }
        if self.chunk_budget >= TELEGRAM_HARD_LIMIT {
            return Err(BarnError::configuration(format!(
                "Chunk budget {} must stay below the {} character message limit",
                self.chunk_budget, TELEGRAM_HARD_LIMIT
            )));
        }
        if self.poll_timeout_secs == 0 {
            return Err(BarnError::configuration("Poll timeout must be greater than zero"));
        }
        if self
            .bot_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(BarnError::configuration("Bot token must not be blank"));
        }
        Ok(())
    }

    /// The bot token, for commands that talk to the messaging service
    pub fn require_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                BarnError::configuration(format!(
                    "Bot token not set; export {ENV_BOT_TOKEN} or add it to .env"
                ))
            })
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = Some(token.into());
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_chunk_budget(mut self, budget: usize) -> Self {
        self.chunk_budget = budget;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
