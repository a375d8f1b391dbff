//! Exporter: time-series table → chunked dump documents
//!
//! The exporter is responsible for:
//! - Querying the whole source table, or one calendar day of it
//! - Packing query pages into documents of at most `BLOCKSIZE` pages
//! - Storing documents under sequentially numbered keys

mod chunker;
mod query;
pub mod telemetry;

pub use chunker::ChunkAccumulator;
pub use query::{export_query, DayFilter, FilterRequest};

use crate::clock::Clock;
use crate::config::BlockSize;
use crate::messaging::{BatchFailures, QueueMessage};
use crate::schema::DumpDocument;
use crate::storage::keys::DumpKey;
use crate::storage::{BucketResolver, ObjectRef};
use crate::timeseries::{TableRef, TimeSeriesSource, DEFAULT_PAGE_SIZE};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Configuration for the exporter
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Table to read
    pub source: TableRef,
    /// Destination bucket for dump documents
    pub bucket: String,
    /// Pages per document
    pub block_size: BlockSize,
    /// Rows per server-side page
    pub page_size: u32,
}

impl ExportConfig {
    pub fn new(source: TableRef, bucket: impl Into<String>, block_size: BlockSize) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(Error::Config("destination bucket is missing".to_string()));
        }
        Ok(Self {
            source,
            bucket,
            block_size,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }
}

/// Summary of one export run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Pages read from the source
    pub pages: usize,
    /// Rows read from the source
    pub rows: usize,
    /// Documents written
    pub documents: usize,
    /// Keys of the written documents, in chunk order
    pub keys: Vec<String>,
    /// Pages whose column layout differed from their chunk's first page
    pub column_mismatches: usize,
}

/// Reads a table page by page and writes it out as dump documents.
pub struct Exporter {
    config: ExportConfig,
    source: Arc<dyn TimeSeriesSource>,
    buckets: Arc<dyn BucketResolver>,
    clock: Arc<dyn Clock>,
}

impl Exporter {
    pub fn new(
        config: ExportConfig,
        source: Arc<dyn TimeSeriesSource>,
        buckets: Arc<dyn BucketResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            source,
            buckets,
            clock,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export the table, or only `filter`'s day of it.
    ///
    /// Errors from the source or the store abort the run; documents already
    /// written stay in place.
    pub async fn export(&self, filter: Option<&DayFilter>) -> Result<ExportReport> {
        let started = Instant::now();
        let result = self.run(filter).await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        telemetry::record_run(outcome, started.elapsed().as_secs_f64());
        result
    }

    /// Run one export per queued day request.
    ///
    /// A message without a valid filter, or whose export fails, is reported
    /// back as a batch failure. Configuration errors abort the batch.
    pub async fn export_messages(&self, messages: &[QueueMessage]) -> Result<BatchFailures> {
        let mut failures = BatchFailures::default();
        for message in messages {
            let outcome = match message
                .require_body()
                .and_then(DayFilter::from_request_body)
            {
                Ok(day) => self.export(Some(&day)).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                if e.is_fatal() {
                    return Err(e);
                }
                error!(message_id = %message.id, error = %e, "Export request failed");
                failures.push(message.id.clone());
            }
        }
        Ok(failures)
    }

    async fn run(&self, filter: Option<&DayFilter>) -> Result<ExportReport> {
        let filter_label = filter.map(|d| d.to_string());
        let prefix = DumpKey::prefix(
            &self.config.source,
            filter_label.as_deref(),
            self.clock.now(),
        );
        let sql = export_query(&self.config.source, filter);
        info!(sql = %sql, block_size = self.config.block_size.get(), "Querying source table");

        let mut cursor = self.source.query(&sql, self.config.page_size).await?;
        let mut chunks = ChunkAccumulator::new(self.config.block_size);
        let mut report = ExportReport::default();

        while let Some(page) = cursor.next_page().await? {
            report.pages += 1;
            report.rows += page.rows.len();
            telemetry::record_page(page.rows.len() as u64);
            debug!(
                page = report.pages,
                rows = page.rows.len(),
                columns = page.column_info.len(),
                "Page received"
            );

            if let Some(document) = chunks.push(page) {
                info!(
                    block_size = self.config.block_size.get(),
                    "Block size reached, rolling to a new document"
                );
                self.store(&prefix, document, &mut report).await?;
            }
        }

        if let Some(document) = chunks.finish() {
            self.store(&prefix, document, &mut report).await?;
        }

        report.column_mismatches = chunks.column_mismatches();
        telemetry::record_column_mismatches(report.column_mismatches as u64);

        info!(
            pages = report.pages,
            rows = report.rows,
            documents = report.documents,
            column_mismatches = report.column_mismatches,
            "Dump finished without interruption"
        );
        Ok(report)
    }

    async fn store(
        &self,
        prefix: &str,
        document: DumpDocument,
        report: &mut ExportReport,
    ) -> Result<()> {
        let chunk = u32::try_from(report.documents + 1)
            .map_err(|_| Error::Internal("chunk number overflow".to_string()))?;
        let key = DumpKey::new(prefix, chunk).to_string();
        let bytes = document.to_json_bytes()?;
        let size = bytes.len() as u64;

        info!(chunk, key = %key, rows = document.rows.len(), "Storing dump document");
        self.buckets
            .put(&ObjectRef::new(self.config.bucket.clone(), key.clone()), bytes)
            .await?;
        telemetry::record_document(size);

        report.documents += 1;
        report.keys.push(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::schema::{ColumnInfo, Datum, QueryPage, Row};
    use crate::storage::MemoryBuckets;
    use crate::timeseries::InMemorySource;
    use chrono::{TimeZone, Utc};

    fn exporter(pages: Vec<QueryPage>, block_size: usize) -> (Exporter, Arc<MemoryBuckets>) {
        let buckets = Arc::new(MemoryBuckets::new());
        let config = ExportConfig::new(
            TableRef::new("db", "tb").unwrap(),
            "dumps",
            BlockSize::new(block_size).unwrap(),
        )
        .unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2022, 6, 1, 8, 30, 0).unwrap());
        let exporter = Exporter::new(
            config,
            Arc::new(InMemorySource::new(pages)),
            buckets.clone(),
            Arc::new(clock),
        );
        (exporter, buckets)
    }

    fn page(rows: usize) -> QueryPage {
        QueryPage::new(
            vec![ColumnInfo::scalar("measure_name", "VARCHAR")],
            (0..rows).map(|_| Row::new(vec![Datum::scalar("m")])).collect(),
        )
    }

    #[test]
    fn test_config_requires_bucket() {
        let err = ExportConfig::new(
            TableRef::new("db", "tb").unwrap(),
            " ",
            BlockSize::new(1).unwrap(),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_export_keys_and_counts() {
        let (exporter, buckets) = exporter(vec![page(2), page(2), page(1)], 2);
        let report = exporter.export(None).await.unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.rows, 5);
        assert_eq!(report.documents, 2);
        assert_eq!(
            report.keys,
            vec![
                "timestream.db.tb.none.2022-06-01T08-30-00.dump.00000001.json".to_string(),
                "timestream.db.tb.none.2022-06-01T08-30-00.dump.00000002.json".to_string(),
            ]
        );
        assert_eq!(buckets.list("dumps").await.unwrap(), report.keys);
    }

    #[tokio::test]
    async fn test_export_messages_reports_bad_requests() {
        let (exporter, buckets) = exporter(vec![page(1)], 1);
        let messages = vec![
            QueueMessage::with_body("ok", r#"{"filter":"2022-01-01"}"#),
            QueueMessage::with_body("no-filter", "{}"),
            QueueMessage::default(),
        ];
        let failures = exporter.export_messages(&messages).await.unwrap();
        assert_eq!(failures.message_ids, vec!["no-filter".to_string(), String::new()]);

        let keys = buckets.list("dumps").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("timestream.db.tb.2022-01-01."));
    }

    #[tokio::test]
    async fn test_empty_result_writes_nothing() {
        let (exporter, buckets) = exporter(vec![], 3);
        let day: DayFilter = "2022-01-01".parse().unwrap();
        let report = exporter.export(Some(&day)).await.unwrap();
        assert_eq!(report, ExportReport::default());
        assert!(buckets.list("dumps").await.unwrap().is_empty());
    }
}
