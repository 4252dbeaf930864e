//! Report pipeline.
//!
//! Decodes a report file, flattens and aggregates it, renders one block per
//! barn, packs the blocks into message chunks, and hands them to the
//! broadcaster. All structural checks run before anything is written to the
//! store, so a malformed report leaves the previous run's data untouched.

use crate::aggregate::{AggregationStats, BarnAggregator};
use crate::broadcast::{Broadcaster, DeliveryReport};
use crate::chunker::chunk_blocks;
use crate::config::{Config, RunMode};
use crate::error::{BarnError, Result};
use crate::flatten::flatten_table;
use crate::format::render_summaries;
use crate::header::decode_report;
use crate::models::{BarnSummary, ReportTable, RunStats};
use crate::store::{ReportStore, SubscriberStore};
use crate::transport::Transport;

use indicatif::ProgressBar;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything derived from a report file before any side effects
#[derive(Debug, Clone)]
pub struct PreparedReport {
    pub table: ReportTable,
    pub summaries: Vec<BarnSummary>,
    pub aggregation: AggregationStats,
    pub blocks: Vec<String>,
    pub chunks: Vec<String>,
}

/// Decode, flatten, aggregate, render and chunk a report file
pub fn prepare_report(path: &Path, chunk_budget: usize) -> Result<PreparedReport> {
    info!("Decoding report: {}", path.display());
    let decoded = decode_report(path)?;
    debug!(
        "Header row at index {}, {} columns, {} data rows",
        decoded.header_row,
        decoded.headers.len(),
        decoded.rows.len()
    );

    let table = flatten_table(decoded);
    let aggregation = BarnAggregator::new()?.aggregate(&table)?;
    debug!(stats = ?aggregation.stats, "Aggregation complete");

    let blocks = render_summaries(&aggregation.summaries);
    let chunks = chunk_blocks(&blocks, chunk_budget);
    info!(
        "Summarised {} barns into {} message chunks",
        aggregation.summaries.len(),
        chunks.len()
    );

    Ok(PreparedReport {
        table,
        summaries: aggregation.summaries,
        aggregation: aggregation.stats,
        blocks,
        chunks,
    })
}

/// Resolve the report source for a run mode
///
/// Only manual mode, reading a file named by the caller, is available.
pub fn resolve_input(mode: RunMode, input: Option<&Path>) -> Result<&Path> {
    match mode {
        RunMode::Auto => Err(BarnError::not_implemented("auto")),
        RunMode::Manual => {
            input.ok_or_else(|| BarnError::missing_input("--file is required in manual mode"))
        }
    }
}

/// Runs the report pipeline against injected stores and transport
pub struct ReportProcessor<'a> {
    config: &'a Config,
    transport: &'a dyn Transport,
    subscribers: &'a dyn SubscriberStore,
    reports: &'a dyn ReportStore,
    progress: Option<ProgressBar>,
}

impl<'a> ReportProcessor<'a> {
    pub fn new(
        config: &'a Config,
        transport: &'a dyn Transport,
        subscribers: &'a dyn SubscriberStore,
        reports: &'a dyn ReportStore,
    ) -> Self {
        Self {
            config,
            transport,
            subscribers,
            reports,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn resolve_input<'p>(&self, input: Option<&'p Path>) -> Result<&'p Path> {
        resolve_input(self.config.mode, input)
    }

    /// Run one full pass: prepare, store the raw table, broadcast, archive
    pub async fn process(&self, input: Option<&Path>) -> Result<(RunStats, DeliveryReport)> {
        let start_time = Instant::now();
        let path = self.resolve_input(input)?;
        let prepared = prepare_report(path, self.config.chunk_budget)?;

        let mut stats = RunStats {
            data_rows: prepared.table.row_count(),
            barns_summarised: prepared.summaries.len(),
            chunks: prepared.chunks.len(),
            ..Default::default()
        };

        if self.config.dry_run {
            info!("Dry run: skipping storage and delivery");
            stats.processing_time_ms = start_time.elapsed().as_millis();
            return Ok((stats, DeliveryReport::default()));
        }

        self.reports.replace_raw_table(&prepared.table)?;

        if prepared.chunks.is_empty() {
            warn!("Report produced no barn summaries; nothing to broadcast");
        }

        let mut broadcaster = Broadcaster::new(self.transport);
        if let Some(pb) = &self.progress {
            broadcaster = broadcaster.with_progress(pb.clone());
        }
        let delivery = broadcaster
            .broadcast_chunks(self.subscribers, &prepared.chunks)
            .await?;

        self.reports.append_summaries(&prepared.chunks)?;

        stats.subscribers = delivery.subscribers;
        stats.deliveries_succeeded = delivery.delivered;
        stats.deliveries_failed = delivery.failed();
        stats.processing_time_ms = start_time.elapsed().as_millis();

        info!(
            delivered = delivery.delivered,
            failed = delivery.failed(),
            elapsed_ms = stats.processing_time_ms as u64,
            "Report run complete"
        );
        Ok((stats, delivery))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockReportStore, MockSubscriberStore};
    use crate::transport::{MockTransport, SendOutcome};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn report_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Daily Report,,,,,,,,").unwrap();
        writeln!(file, "House Code,Batch ID,Breed - Grade,Age Days,Qty Chick In (no tolerancy) /Tot Order,MORTALITY,,Feed Used (Kg),Avg BW").unwrap();
        writeln!(file, ",,,,,Dead,%,Qty,").unwrap();
        writeln!(file, "1001,B-01,Cobb,21,\"10,000\",200,2,\"1,500\",950").unwrap();
        writeln!(file, ",B-01b,,,,,,500,").unwrap();
        writeln!(file, "All Total,All Total,,,,,,,").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_prepare_report() {
        let file = report_file();
        let prepared = prepare_report(file.path(), 4000).unwrap();

        assert_eq!(prepared.summaries.len(), 1);
        let barn = &prepared.summaries[0];
        assert_eq!(barn.code, "1001");
        assert_eq!(barn.live_birds, 9_800);
        assert_eq!(barn.feed_total_kg, 2_000);
        assert_eq!(prepared.chunks.len(), 1);
        assert!(prepared.chunks[0].contains("(CI 10,000 │ Mort 200 │ 2.00 %)"));
    }

    #[test]
    fn test_resolve_input_by_mode() {
        let store_s = MockSubscriberStore::new();
        let store_r = MockReportStore::new();
        let transport = MockTransport::new();

        let manual = Config::default();
        let processor = ReportProcessor::new(&manual, &transport, &store_s, &store_r);
        assert!(matches!(
            processor.resolve_input(None),
            Err(BarnError::MissingInput { .. })
        ));
        assert!(processor.resolve_input(Some(Path::new("r.csv"))).is_ok());

        let auto = Config::default().with_mode(RunMode::Auto);
        let processor = ReportProcessor::new(&auto, &transport, &store_s, &store_r);
        assert!(matches!(
            processor.resolve_input(Some(Path::new("r.csv"))),
            Err(BarnError::NotImplemented { .. })
        ));
    }

    #[tokio::test]
    async fn test_process_stores_broadcasts_and_archives() {
        let file = report_file();
        let config = Config::default();

        let mut subscribers = MockSubscriberStore::new();
        subscribers.expect_subscribers().returning(|| Ok(vec![11, 12]));

        let mut reports = MockReportStore::new();
        reports
            .expect_replace_raw_table()
            .withf(|table| table.row_count() == 3)
            .times(1)
            .returning(|_| Ok(()));
        reports
            .expect_append_summaries()
            .withf(|chunks| chunks.len() == 1)
            .times(1)
            .returning(|_| Ok(()));

        let mut transport = MockTransport::new();
        transport
            .expect_send_text()
            .times(2)
            .returning(|_, _, _| SendOutcome::Delivered);

        let processor = ReportProcessor::new(&config, &transport, &subscribers, &reports);
        let (stats, delivery) = processor.process(Some(file.path())).await.unwrap();

        assert_eq!(stats.barns_summarised, 1);
        assert_eq!(stats.deliveries_succeeded, 2);
        assert!(delivery.is_complete());
    }

    #[tokio::test]
    async fn test_malformed_report_writes_nothing() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Kandang,Batch").unwrap();
        writeln!(file, "1001,B-01").unwrap();
        file.flush().unwrap();

        let config = Config::default();
        let subscribers = MockSubscriberStore::new();
        let mut reports = MockReportStore::new();
        reports.expect_replace_raw_table().never();
        reports.expect_append_summaries().never();
        let transport = MockTransport::new();

        let processor = ReportProcessor::new(&config, &transport, &subscribers, &reports);
        let err = processor.process(Some(file.path())).await.unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[tokio::test]
    async fn test_dry_run_has_no_side_effects() {
        let file = report_file();
        let config = Config::default().with_dry_run(true);
        let subscribers = MockSubscriberStore::new();
        let reports = MockReportStore::new();
        let transport = MockTransport::new();

        let processor = ReportProcessor::new(&config, &transport, &subscribers, &reports);
        let (stats, delivery) = processor.process(Some(file.path())).await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(delivery.attempted, 0);
    }
}
