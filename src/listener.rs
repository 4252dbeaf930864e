//! Long-polling command listener.
//!
//! Polls the transport for inbound messages and reacts to two commands:
//! `/start` registers the sender as a subscriber, `/broadcast <text>` relays
//! the text to every current subscriber. Everything else is ignored.

use crate::broadcast::{Broadcaster, deliver};
use crate::constants::{BROADCAST_COMMAND, REGISTER_COMMAND, REGISTERED_REPLY};
use crate::error::Result;
use crate::store::SubscriberStore;
use crate::transport::{InboundMessage, ParseMode, Transport};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A recognised inbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register,
    /// Text to relay, already trimmed
    Broadcast(String),
    Ignored,
}

/// Classify an inbound message text
///
/// `/start` must be the whole message, optionally addressed as
/// `/start@<bot>`.
pub fn parse_command(text: &str) -> Command {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix(REGISTER_COMMAND) {
        if rest.is_empty() || rest.starts_with('@') {
            return Command::Register;
        }
    }
    match text.strip_prefix(BROADCAST_COMMAND) {
        Some(rest) if !rest.trim().is_empty() => Command::Broadcast(rest.trim().to_string()),
        _ => Command::Ignored,
    }
}

/// Reply sent to the issuer of a `/broadcast`
pub fn broadcast_reply(sent: usize) -> String {
    format!("📣 Pesan terkirim ke {sent} subscriber.")
}

/// Counters for one listener session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListenerStats {
    /// Updates fetched, with or without text
    pub updates_seen: usize,
    /// New subscribers added
    pub registrations: usize,
    /// `/broadcast` messages relayed
    pub relays: usize,
    /// Failed polls that were logged and skipped
    pub poll_errors: usize,
}

pub struct Listener<'a, T: Transport + ?Sized, S: SubscriberStore + ?Sized> {
    transport: &'a T,
    store: &'a S,
    poll_timeout: Duration,
    poll_interval: Duration,
    offset: Option<i64>,
    stats: ListenerStats,
}

impl<'a, T, S> Listener<'a, T, S>
where
    T: Transport + ?Sized,
    S: SubscriberStore + ?Sized,
{
    pub fn new(transport: &'a T, store: &'a S, poll_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            transport,
            store,
            poll_timeout,
            poll_interval,
            offset: None,
            stats: ListenerStats::default(),
        }
    }

    /// Offset the next poll will request
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    /// Handle one inbound message
    ///
    /// Store errors propagate; delivery problems are logged and counted by
    /// the broadcaster.
    pub async fn handle_message(&mut self, message: &InboundMessage) -> Result<Command> {
        let (Some(chat_id), Some(text)) = (message.chat_id, message.text.as_deref()) else {
            return Ok(Command::Ignored);
        };

        let command = parse_command(text);
        match &command {
            Command::Register => {
                let added = self.store.add_subscriber(chat_id)?;
                if added {
                    self.stats.registrations += 1;
                    info!(chat_id, "Registered new subscriber");
                } else {
                    debug!(chat_id, "Subscriber already registered");
                }
                self.reply(chat_id, REGISTERED_REPLY).await;
            }
            Command::Broadcast(body) => {
                let subscribers = self.store.subscribers()?;
                let report = Broadcaster::new(self.transport).relay(&subscribers, body).await;
                self.stats.relays += 1;
                info!(
                    chat_id,
                    delivered = report.delivered,
                    failed = report.failed(),
                    "Relayed broadcast"
                );
                self.reply(chat_id, &broadcast_reply(report.delivered)).await;
            }
            Command::Ignored => debug!(chat_id, "Ignoring message"),
        }

        Ok(command)
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        let result = deliver(self.transport, chat_id, text, ParseMode::Plain).await;
        debug!(chat_id, ?result, "Reply sent");
    }

    /// Fetch and handle one batch of updates
    ///
    /// The offset advances past every update seen, including ones without
    /// text, so nothing is fetched twice.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .transport
            .get_updates(self.offset, self.poll_timeout)
            .await?;

        for update in &updates {
            self.offset = Some(update.update_id + 1);
            self.stats.updates_seen += 1;
            self.handle_message(update).await?;
        }
        Ok(updates.len())
    }

    /// Poll until `cancel` fires
    ///
    /// Transport errors are logged and polling continues after the usual
    /// pause. Store errors stop the loop.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<ListenerStats> {
        info!("Listening for commands");

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.poll_once() => polled,
            };

            match polled {
                Ok(count) if count > 0 => debug!(count, "Handled updates"),
                Ok(_) => {}
                Err(e) if e.is_storage() => return Err(e),
                Err(e) => {
                    self.stats.poll_errors += 1;
                    warn!(error = %e, "Polling failed");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(
            updates = self.stats.updates_seen,
            registrations = self.stats.registrations,
            "Listener stopped"
        );
        Ok(self.stats.clone())
    }
}
