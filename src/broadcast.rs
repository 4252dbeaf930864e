//! Delivery of message chunks to subscribers.
//!
//! Every (subscriber, chunk) pair is an independent delivery. A rate-limited
//! delivery waits for the cooldown the transport reported and is retried
//! exactly once; whatever happens on the retry is final. Failed deliveries are
//! recorded in the [`DeliveryReport`] and never abort the rest of the pass.

use crate::error::Result;
use crate::store::SubscriberStore;
use crate::transport::{ParseMode, SendOutcome, Transport};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

/// A delivery that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Subscriber the chunk was meant for
    pub chat_id: i64,
    /// Position of the chunk in the broadcast
    pub chunk_index: usize,
    /// Failure reason reported by the transport
    pub reason: String,
}

/// Outcome of one broadcast pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers in the snapshot taken before sending
    pub subscribers: usize,
    /// Number of deliveries attempted
    pub attempted: usize,
    /// Number of deliveries that succeeded
    pub delivered: usize,
    /// Deliveries that needed the rate-limit retry, whatever its outcome
    pub retried: usize,
    /// Every delivery that failed, in send order
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of delivering one message to one chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered { retried: bool },
    Failed { retried: bool, reason: String },
}

/// Send once, and once more after the cooldown if the transport rate-limits us
pub async fn deliver<T>(transport: &T, chat_id: i64, text: &str, mode: ParseMode) -> DeliveryResult
where
    T: Transport + ?Sized,
{
    match transport.send_text(chat_id, text, mode).await {
        SendOutcome::Delivered => DeliveryResult::Delivered { retried: false },
        SendOutcome::Failed(reason) => DeliveryResult::Failed {
            retried: false,
            reason,
        },
        SendOutcome::RateLimited(cooldown) => {
            warn!(
                chat_id,
                cooldown_secs = cooldown.as_secs_f64(),
                "Rate limited, retrying once after cooldown"
            );
            tokio::time::sleep(cooldown).await;

            match transport.send_text(chat_id, text, mode).await {
                SendOutcome::Delivered => DeliveryResult::Delivered { retried: true },
                SendOutcome::RateLimited(again) => DeliveryResult::Failed {
                    retried: true,
                    reason: format!("rate limited again (retry after {}s)", again.as_secs()),
                },
                SendOutcome::Failed(reason) => DeliveryResult::Failed {
                    retried: true,
                    reason,
                },
            }
        }
    }
}

/// Wrap a chunk for monospace display, escaping HTML special characters
pub fn wrap_preformatted(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<pre>{escaped}</pre>")
}

/// Sends a sequence of messages to a snapshot of subscribers
pub struct Broadcaster<'a, T: Transport + ?Sized> {
    transport: &'a T,
    progress: Option<ProgressBar>,
}

impl<'a, T: Transport + ?Sized> Broadcaster<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            progress: None,
        }
    }

    /// Advance `progress` by one for every delivery
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Deliver report chunks (as preformatted HTML) to every current subscriber
    ///
    /// The subscriber list is read once; later registrations wait for the
    /// next pass. An empty list is not an error.
    pub async fn broadcast_chunks<S>(&self, store: &S, chunks: &[String]) -> Result<DeliveryReport>
    where
        S: SubscriberStore + ?Sized,
    {
        let subscribers = store.subscribers()?;
        if subscribers.is_empty() {
            warn!("No subscribers registered; ask them to send /start first");
            return Ok(DeliveryReport::default());
        }

        info!(
            "Broadcasting {} chunks to {} subscribers",
            chunks.len(),
            subscribers.len()
        );
        let payloads: Vec<String> = chunks.iter().map(|c| wrap_preformatted(c)).collect();
        Ok(self.send_all(&subscribers, &payloads, ParseMode::Html).await)
    }

    /// Relay plain text to the given subscribers
    pub async fn relay(&self, subscribers: &[i64], text: &str) -> DeliveryReport {
        self.send_all(subscribers, &[text.to_string()], ParseMode::Plain)
            .await
    }

    async fn send_all(&self, subscribers: &[i64], messages: &[String], mode: ParseMode) -> DeliveryReport {
        let mut report = DeliveryReport {
            subscribers: subscribers.len(),
            ..Default::default()
        };

        if let Some(pb) = &self.progress {
            pb.set_length((subscribers.len() * messages.len()) as u64);
        }

        for (chunk_index, message) in messages.iter().enumerate() {
            for &chat_id in subscribers {
                report.attempted += 1;
                match deliver(self.transport, chat_id, message, mode).await {
                    DeliveryResult::Delivered { retried } => {
                        report.delivered += 1;
                        report.retried += usize::from(retried);
                        debug!(chat_id, chunk_index, "Delivered");
                    }
                    DeliveryResult::Failed { retried, reason } => {
                        report.retried += usize::from(retried);
                        warn!(chat_id, chunk_index, %reason, "Delivery failed");
                        report.failures.push(DeliveryFailure {
                            chat_id,
                            chunk_index,
                            reason,
                        });
                    }
                }
                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockSubscriberStore;
    use crate::transport::MockTransport;
    use mockall::Sequence;
    use mockall::predicate::{always, eq};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_delivery_retries_once_after_cooldown() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send_text()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| SendOutcome::RateLimited(Duration::from_secs(5)));
        transport
            .expect_send_text()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| SendOutcome::Delivered);

        let started = tokio::time::Instant::now();
        let result = deliver(&transport, 1, "hello", ParseMode::Plain).await;

        assert_eq!(result, DeliveryResult::Delivered { retried: true });
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_rate_limit_is_a_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_send_text()
            .times(2)
            .returning(|_, _, _| SendOutcome::RateLimited(Duration::from_secs(1)));

        let result = deliver(&transport, 1, "hello", ParseMode::Plain).await;
        assert!(matches!(result, DeliveryResult::Failed { retried: true, .. }));
    }

    #[tokio::test]
    async fn test_plain_failure_is_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_send_text()
            .times(1)
            .returning(|_, _, _| SendOutcome::Failed("Forbidden".to_string()));

        let result = deliver(&transport, 1, "hello", ParseMode::Plain).await;
        assert_eq!(
            result,
            DeliveryResult::Failed {
                retried: false,
                reason: "Forbidden".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscriber_does_not_abort_broadcast() {
        let mut store = MockSubscriberStore::new();
        store.expect_subscribers().returning(|| Ok(vec![1, 2, 3]));

        let mut transport = MockTransport::new();
        transport
            .expect_send_text()
            .with(eq(2), always(), eq(ParseMode::Html))
            .returning(|_, _, _| SendOutcome::RateLimited(Duration::from_secs(3)));
        transport
            .expect_send_text()
            .returning(|_, _, _| SendOutcome::Delivered);

        let chunks = vec!["chunk a".to_string(), "chunk b".to_string()];
        let report = Broadcaster::new(&transport)
            .broadcast_chunks(&store, &chunks)
            .await
            .unwrap();

        assert_eq!(report.subscribers, 3);
        assert_eq!(report.attempted, 6);
        assert_eq!(report.delivered, 4);
        assert_eq!(report.retried, 2);
        assert_eq!(report.failed(), 2);
        assert!(report.failures.iter().all(|f| f.chat_id == 2));
        assert_eq!(report.failures[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn test_no_subscribers_sends_nothing() {
        let mut store = MockSubscriberStore::new();
        store.expect_subscribers().returning(|| Ok(vec![]));
        let mut transport = MockTransport::new();
        transport.expect_send_text().never();

        let report = Broadcaster::new(&transport)
            .broadcast_chunks(&store, &["x".to_string()])
            .await
            .unwrap();
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_chunks_are_sent_preformatted() {
        let mut store = MockSubscriberStore::new();
        store.expect_subscribers().returning(|| Ok(vec![9]));
        let mut transport = MockTransport::new();
        transport
            .expect_send_text()
            .withf(|chat_id, text, mode| {
                *chat_id == 9 && text == "<pre>CI &lt;5&gt; &amp; more</pre>" && *mode == ParseMode::Html
            })
            .times(1)
            .returning(|_, _, _| SendOutcome::Delivered);

        let report = Broadcaster::new(&transport)
            .broadcast_chunks(&store, &["CI <5> & more".to_string()])
            .await
            .unwrap();
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_relay_counts_deliveries() {
        let mut transport = MockTransport::new();
        transport
            .expect_send_text()
            .with(eq(1), eq("hi all"), eq(ParseMode::Plain))
            .returning(|_, _, _| SendOutcome::Delivered);
        transport
            .expect_send_text()
            .with(eq(2), eq("hi all"), eq(ParseMode::Plain))
            .returning(|_, _, _| SendOutcome::Failed("blocked".to_string()));

        let report = Broadcaster::new(&transport).relay(&[1, 2], "hi all").await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed(), 1);
    }
}
