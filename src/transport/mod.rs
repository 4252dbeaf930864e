//! # transport: messaging channel abstraction
//!
//! The [`Transport`] trait is the only way the rest of the crate talks to the
//! messaging service: sending a text message to one chat and long-polling for
//! inbound messages. [`telegram::TelegramClient`] implements it against the
//! Telegram Bot HTTP API; tests inject the generated `MockTransport`.
//!
//! Sending never returns an `Err`: the outcome is classified into
//! [`SendOutcome`] so callers can decide on retries per delivery without
//! unwinding a whole broadcast.

pub mod telegram;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

pub use telegram::TelegramClient;

/// How the transport should interpret message markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Plain,
    Html,
}

/// Result of a single send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The service asked us to wait this long before trying again
    RateLimited(Duration),
    Failed(String),
}

/// One inbound update from the long-poll endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Monotonically increasing; the next poll starts at the last id + 1
    pub update_id: i64,
    /// Sender chat; absent for updates that are not messages
    pub chat_id: Option<i64>,
    pub text: Option<String>,
}

/// Send text messages and receive inbound updates.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `text` to `chat_id`, classifying the result
    async fn send_text(&self, chat_id: i64, text: &str, parse_mode: ParseMode) -> SendOutcome;

    /// Long-poll for updates starting at `offset`, waiting up to `timeout`
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<InboundMessage>>;
}
