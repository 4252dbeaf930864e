//! Integration tests for the report pipeline
//!
//! Run a real report fixture through decoding, aggregation, chunking,
//! SQLite persistence and a mocked transport.

use barn_broadcast::broadcast::wrap_preformatted;
use barn_broadcast::store::SubscriberStore;
use barn_broadcast::transport::{MockTransport, ParseMode, SendOutcome};
use barn_broadcast::{BarnError, Config, ReportProcessor, SqliteStore, prepare_report};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("daily_report.csv")
}

type SentLog = Arc<Mutex<Vec<(i64, String, ParseMode)>>>;

/// Transport that records every send and always delivers
fn recording_transport() -> (MockTransport, SentLog) {
    let sent: SentLog = Arc::default();
    let log = sent.clone();
    let mut transport = MockTransport::new();
    transport.expect_send_text().returning(move |chat_id, text, mode| {
        log.lock().unwrap().push((chat_id, text.to_string(), mode));
        SendOutcome::Delivered
    });
    (transport, sent)
}

/// Purpose: verify the per-barn numbers for a realistic export
/// Benefit: covers forward-filled codes, sub-row feed, header remnants and coercion together
#[test]
fn test_fixture_summaries() {
    let prepared = prepare_report(&fixture(), 4000).unwrap();

    let codes: Vec<&str> = prepared.summaries.iter().map(|s| s.code.as_str()).collect();
    assert_eq!(codes, vec!["1001", "1002", "1003"]);

    assert_eq!(
        prepared.blocks[0],
        "📈 Kandang 1001 (Cobb - A) – Day 21\n\
         🐣 Live birds: 9,800 (CI 10,000 │ Mort 200 │ 2.00 %)\n\
         🌾 Feed: 1,750 kg total\n\
         ⚖️ Avg BW: 0.95 kg │ FCR: 1.42 │ EEF: 385"
    );

    let ross = &prepared.summaries[1];
    assert_eq!(ross.live_birds, 12_350);
    assert_eq!(ross.feed_total_kg, 1_400);
    assert!((ross.avg_body_weight_kg - 1.01).abs() < 1e-9);

    // Unparseable chick-in coerces to zero; mortality share falls back to zero
    let third = &prepared.summaries[2];
    assert_eq!(third.chick_in, 0);
    assert_eq!(third.mortality_pct, 0.0);
    assert_eq!(third.live_birds, -35);
    assert_eq!(third.fcr, "—");
    assert_eq!(third.eef, "—");

    assert_eq!(prepared.aggregation.header_remnants, 2);
    assert_eq!(prepared.chunks.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_broadcast_with_rate_limit() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.add_subscriber(100).unwrap();
    store.add_subscriber(200).unwrap();

    let sent: SentLog = Arc::default();
    let log = sent.clone();
    let throttled_once = Arc::new(AtomicBool::new(false));
    let mut transport = MockTransport::new();
    transport.expect_send_text().returning(move |chat_id, text, mode| {
        if chat_id == 200 && !throttled_once.swap(true, Ordering::SeqCst) {
            return SendOutcome::RateLimited(Duration::from_secs(3));
        }
        log.lock().unwrap().push((chat_id, text.to_string(), mode));
        SendOutcome::Delivered
    });

    let config = Config::default();
    let processor = ReportProcessor::new(&config, &transport, &store, &store);
    let (stats, delivery) = processor.process(Some(&fixture())).await.unwrap();

    assert_eq!(stats.data_rows, 7);
    assert_eq!(stats.barns_summarised, 3);
    assert_eq!(stats.subscribers, 2);
    assert_eq!(stats.deliveries_succeeded, 2);
    assert_eq!(delivery.retried, 1);
    assert!(delivery.is_complete());

    let archived = store.summaries().unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(store.raw_row_count().unwrap(), 7);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, 100);
    assert_eq!(sent[1].0, 200);
    assert!(sent.iter().all(|(_, text, mode)| {
        *mode == ParseMode::Html && *text == wrap_preformatted(&archived[0])
    }));
}

#[tokio::test]
async fn test_small_budget_splits_chunks_in_order() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.add_subscriber(1).unwrap();
    let (transport, sent) = recording_transport();

    let config = Config::default().with_chunk_budget(200);
    let processor = ReportProcessor::new(&config, &transport, &store, &store);
    let (stats, _) = processor.process(Some(&fixture())).await.unwrap();

    assert_eq!(stats.chunks, 3);
    let archived = store.summaries().unwrap();
    assert!(archived[0].contains("Kandang 1001"));
    assert!(archived[1].contains("Kandang 1002"));
    assert!(archived[2].contains("Kandang 1003"));
    assert_eq!(sent.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_no_subscribers_still_archives() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut transport = MockTransport::new();
    transport.expect_send_text().never();

    let config = Config::default();
    let processor = ReportProcessor::new(&config, &transport, &store, &store);
    let (stats, delivery) = processor.process(Some(&fixture())).await.unwrap();

    assert_eq!(stats.subscribers, 0);
    assert_eq!(delivery.attempted, 0);
    assert_eq!(store.summaries().unwrap().len(), 1);
}

/// Purpose: a report without the header marker must not touch stored data
#[tokio::test]
async fn test_missing_marker_keeps_previous_run() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (transport, _) = recording_transport();
    let config = Config::default();
    let processor = ReportProcessor::new(&config, &transport, &store, &store);
    processor.process(Some(&fixture())).await.unwrap();

    let mut broken = NamedTempFile::new().unwrap();
    writeln!(broken, "Kandang,Batch,Umur").unwrap();
    writeln!(broken, "1001,B2401,21").unwrap();
    broken.flush().unwrap();

    let err = processor.process(Some(broken.path())).await.unwrap_err();
    assert!(matches!(err, BarnError::MissingHeaderMarker { .. }));
    assert_eq!(store.raw_row_count().unwrap(), 7);
    assert_eq!(store.summaries().unwrap().len(), 1);
}

#[tokio::test]
async fn test_manual_mode_requires_file() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (transport, _) = recording_transport();
    let config = Config::default();
    let processor = ReportProcessor::new(&config, &transport, &store, &store);

    let err = processor.process(None).await.unwrap_err();
    assert!(matches!(err, BarnError::MissingInput { .. }));
}
