//! Importer: dump documents → time-series records
//!
//! Each referenced document is fetched, its rows are reshaped against the
//! document's column layout and the resulting records are written to the
//! destination table in batches of at most
//! [`MAX_RECORDS_PER_WRITE`](crate::schema::MAX_RECORDS_PER_WRITE).

mod batcher;
mod reshape;
pub mod telemetry;

pub use batcher::RecordBatcher;
pub use reshape::{parse_time_millis, reshape_row, RowIssue, RowIssueKind};

use crate::messaging::QueueMessage;
use crate::schema::{DumpDocument, WriteRecord};
use crate::storage::{BucketResolver, ObjectRef};
use crate::timeseries::{TableRef, TimeSeriesSink};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Configuration for the importer
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Table receiving the records; must already exist
    pub destination: TableRef,
}

/// Summary of one imported document, or of several merged together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub rows_read: usize,
    /// Records the sink accepted
    pub records_written: usize,
    pub write_calls: usize,
    pub rows_skipped: usize,
    pub records_rejected: usize,
    pub issues: Vec<RowIssue>,
}

impl ImportReport {
    pub fn merge(&mut self, other: ImportReport) {
        self.rows_read += other.rows_read;
        self.records_written += other.records_written;
        self.write_calls += other.write_calls;
        self.rows_skipped += other.rows_skipped;
        self.records_rejected += other.records_rejected;
        self.issues.extend(other.issues);
    }
}

/// Outcome of a queue-triggered import.
#[derive(Debug, Default)]
pub struct BatchImport {
    /// Totals over the references that were processed
    pub report: ImportReport,
    /// References that failed, with the error that stopped them
    pub failed: Vec<(String, crate::Error)>,
}

/// Writes dump documents into the destination table.
pub struct Importer {
    config: ImportConfig,
    sink: Arc<dyn TimeSeriesSink>,
    buckets: Arc<dyn BucketResolver>,
}

impl Importer {
    pub fn new(
        config: ImportConfig,
        sink: Arc<dyn TimeSeriesSink>,
        buckets: Arc<dyn BucketResolver>,
    ) -> Self {
        Self {
            config,
            sink,
            buckets,
        }
    }

    /// Fails with a precondition error when the destination is missing.
    pub async fn check_destination(&self) -> Result<()> {
        self.sink.describe_table(&self.config.destination).await
    }

    /// Import one document.
    ///
    /// Rows that cannot be reshaped are reported in the result; fetch,
    /// decode and write failures abort this document.
    pub async fn import_object(&self, object: &ObjectRef) -> Result<ImportReport> {
        let result = self.import_document(object).await;
        match &result {
            Ok(report) => telemetry::record_document(
                "success",
                report.rows_read as u64,
                report.rows_skipped as u64,
            ),
            Err(_) => telemetry::record_document("error", 0, 0),
        }
        result
    }

    /// Import every object referenced by a queue batch.
    ///
    /// The destination check runs first and aborts the batch. Failures of
    /// individual references are logged and returned, and never stop the
    /// remaining references.
    pub async fn import_messages(&self, messages: &[QueueMessage]) -> Result<BatchImport> {
        self.check_destination().await?;

        let mut batch = BatchImport::default();
        for message in messages {
            let outcome = match message.object_ref() {
                Ok(object) => self.import_object(&object).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(report) => batch.report.merge(report),
                Err(e) => {
                    error!(message_id = %message.id, error = %e, "Failed to import referenced document");
                    batch.failed.push((message.id.clone(), e));
                }
            }
        }
        Ok(batch)
    }

    async fn import_document(&self, object: &ObjectRef) -> Result<ImportReport> {
        debug!(object = %object, "Fetching dump document");
        let bytes = self.buckets.get(object).await?;
        let document = DumpDocument::from_json_slice(&bytes)?;
        info!(
            object = %object,
            rows = document.rows.len(),
            columns = document.column_info.len(),
            "Document read"
        );

        let mut report = ImportReport::default();
        let mut batcher = RecordBatcher::default();

        for (index, row) in document.rows.iter().enumerate() {
            report.rows_read += 1;
            match reshape_row(&document.column_info, row, index) {
                Ok(record) => {
                    if let Some(batch) = batcher.push(record) {
                        debug!(records = batch.len(), "Batch full, writing");
                        self.write_batch(&batch, &mut report).await?;
                    }
                }
                Err(issue) => {
                    warn!(object = %object, issue = %issue, "Skipping row");
                    report.rows_skipped += 1;
                    report.issues.push(issue);
                }
            }
        }

        if let Some(batch) = batcher.finish() {
            debug!(records = batch.len(), "Writing remaining records");
            self.write_batch(&batch, &mut report).await?;
        }

        info!(
            object = %object,
            rows_read = report.rows_read,
            records_written = report.records_written,
            rows_skipped = report.rows_skipped,
            records_rejected = report.records_rejected,
            write_calls = report.write_calls,
            "Document imported"
        );
        Ok(report)
    }

    async fn write_batch(&self, records: &[WriteRecord], report: &mut ImportReport) -> Result<()> {
        let outcome = self
            .sink
            .write_records(&self.config.destination, records, None)
            .await?;
        report.write_calls += 1;

        for rejected in &outcome.rejected {
            warn!(
                index = rejected.index,
                reason = %rejected.reason,
                "Record rejected by the sink"
            );
        }
        let rejected = outcome.rejected.len().min(records.len());
        let accepted = records.len() - rejected;
        report.records_rejected += rejected;
        report.records_written += accepted;
        telemetry::record_write(accepted as u64, rejected as u64);
        Ok(())
    }
}
