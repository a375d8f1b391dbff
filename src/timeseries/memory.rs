//! In-memory time-series source and sink for development and testing

use super::{
    PageCursor, RejectedRecord, TableRef, TimeSeriesSink, TimeSeriesSource, WriteOutcome,
};
use crate::schema::{CommonAttributes, QueryPage, WriteRecord, MAX_RECORDS_PER_WRITE};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Source that replays a fixed list of pages for every query.
///
/// Issued query strings are recorded so tests can assert on them. A failure
/// can be injected after a given number of pages.
#[derive(Debug, Default)]
pub struct InMemorySource {
    pages: Vec<QueryPage>,
    fail_after: Option<usize>,
    queries: Mutex<Vec<String>>,
}

impl InMemorySource {
    pub fn new(pages: Vec<QueryPage>) -> Self {
        Self {
            pages,
            fail_after: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Fail the cursor once `pages` pages have been returned.
    pub fn failing_after(mut self, pages: usize) -> Self {
        self.fail_after = Some(pages);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

struct ReplayCursor {
    pages: VecDeque<QueryPage>,
    served: usize,
    fail_after: Option<usize>,
}

#[async_trait]
impl PageCursor for ReplayCursor {
    async fn next_page(&mut self) -> Result<Option<QueryPage>> {
        if self.fail_after == Some(self.served) {
            return Err(Error::Query(format!(
                "injected failure after {} pages",
                self.served
            )));
        }
        let page = self.pages.pop_front();
        if page.is_some() {
            self.served += 1;
        }
        Ok(page)
    }
}

#[async_trait]
impl TimeSeriesSource for InMemorySource {
    async fn query(&self, sql: &str, _page_size: u32) -> Result<Box<dyn PageCursor>> {
        self.queries.lock().push(sql.to_string());
        Ok(Box::new(ReplayCursor {
            pages: self.pages.iter().cloned().collect(),
            served: 0,
            fail_after: self.fail_after,
        }))
    }
}

type Rejector = Arc<dyn Fn(usize, &WriteRecord) -> Option<String> + Send + Sync>;

/// One write call as received by [`InMemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    pub table: TableRef,
    pub records: Vec<WriteRecord>,
    pub common: Option<CommonAttributes>,
}

/// Sink that keeps every write call in memory.
///
/// Tables must be registered before writes are accepted, mirroring a real
/// store where the destination is provisioned ahead of time.
#[derive(Default)]
pub struct InMemorySink {
    tables: Mutex<HashSet<TableRef>>,
    calls: Mutex<Vec<WriteCall>>,
    rejector: Option<Rejector>,
    fail_calls: Mutex<HashSet<usize>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: TableRef) -> Self {
        self.tables.lock().insert(table);
        self
    }

    /// Reject every record for which `rejector` returns a reason.
    pub fn rejecting<F>(mut self, rejector: F) -> Self
    where
        F: Fn(usize, &WriteRecord) -> Option<String> + Send + Sync + 'static,
    {
        self.rejector = Some(Arc::new(rejector));
        self
    }

    /// Fail the write call with the given zero-based sequence number.
    pub fn failing_call(self, call: usize) -> Self {
        self.fail_calls.lock().insert(call);
        self
    }

    pub fn calls(&self) -> Vec<WriteCall> {
        self.calls.lock().clone()
    }

    /// Every record written, in submission order.
    pub fn records(&self) -> Vec<WriteRecord> {
        self.calls
            .lock()
            .iter()
            .flat_map(|c| c.records.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl TimeSeriesSink for InMemorySink {
    async fn describe_table(&self, table: &TableRef) -> Result<()> {
        if self.tables.lock().contains(table) {
            Ok(())
        } else {
            Err(Error::Precondition(format!("table {} does not exist", table)))
        }
    }

    async fn write_records(
        &self,
        table: &TableRef,
        records: &[WriteRecord],
        common: Option<&CommonAttributes>,
    ) -> Result<WriteOutcome> {
        let mut calls = self.calls.lock();
        let sequence = calls.len();
        if self.fail_calls.lock().remove(&sequence) {
            return Err(Error::Write(format!("injected failure on call {}", sequence)));
        }
        if !self.tables.lock().contains(table) {
            return Err(Error::Write(format!("table {} does not exist", table)));
        }
        if records.len() > MAX_RECORDS_PER_WRITE {
            return Err(Error::Write(format!(
                "{} records exceed the limit of {} per call",
                records.len(),
                MAX_RECORDS_PER_WRITE
            )));
        }

        let rejected: Vec<RejectedRecord> = match &self.rejector {
            Some(rejector) => records
                .iter()
                .enumerate()
                .filter_map(|(index, record)| {
                    rejector(index, record).map(|reason| RejectedRecord { index, reason })
                })
                .collect(),
            None => Vec::new(),
        };

        calls.push(WriteCall {
            table: table.clone(),
            records: records.to_vec(),
            common: common.cloned(),
        });
        Ok(WriteOutcome { rejected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnInfo, Datum, Row};

    fn page(n: usize) -> QueryPage {
        QueryPage::new(
            vec![ColumnInfo::scalar("measure_name", "VARCHAR")],
            (0..n).map(|_| Row::new(vec![Datum::scalar("m")])).collect(),
        )
    }

    #[tokio::test]
    async fn test_source_replays_pages_per_query() {
        let source = InMemorySource::new(vec![page(1), page(2)]);
        for _ in 0..2 {
            let mut cursor = source.query("SELECT 1", 10).await.unwrap();
            assert_eq!(cursor.next_page().await.unwrap().unwrap().rows.len(), 1);
            assert_eq!(cursor.next_page().await.unwrap().unwrap().rows.len(), 2);
            assert!(cursor.next_page().await.unwrap().is_none());
        }
        assert_eq!(source.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_source_injected_failure() {
        let source = InMemorySource::new(vec![page(1), page(1)]).failing_after(1);
        let mut cursor = source.query("SELECT 1", 10).await.unwrap();
        assert!(cursor.next_page().await.unwrap().is_some());
        assert!(matches!(cursor.next_page().await, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn test_sink_requires_table() {
        let table = TableRef::new("db", "tb").unwrap();
        let sink = InMemorySink::new();
        assert!(matches!(
            sink.describe_table(&table).await,
            Err(Error::Precondition(_))
        ));
        let sink = sink.with_table(table.clone());
        sink.describe_table(&table).await.unwrap();
    }

    #[tokio::test]
    async fn test_sink_enforces_ceiling_and_rejects() {
        let table = TableRef::new("db", "tb").unwrap();
        let sink = InMemorySink::new()
            .with_table(table.clone())
            .rejecting(|index, _| (index == 1).then(|| "bad".to_string()));

        let too_many = vec![WriteRecord::default(); MAX_RECORDS_PER_WRITE + 1];
        assert!(matches!(
            sink.write_records(&table, &too_many, None).await,
            Err(Error::Write(_))
        ));

        let outcome = sink
            .write_records(&table, &vec![WriteRecord::default(); 3], None)
            .await
            .unwrap();
        assert!(outcome.is_partial());
        assert_eq!(outcome.rejected[0].index, 1);
        assert_eq!(sink.calls().len(), 1);
    }
}
