//! Time-series source and sink interfaces
//!
//! The exporter reads through [`TimeSeriesSource`], the importer and the
//! ingest relay write through [`TimeSeriesSink`]. Production uses the
//! Timestream adapters in [`timestream`]; tests use [`memory`].

pub mod memory;
pub mod timestream;

pub use memory::{InMemorySink, InMemorySource};
pub use timestream::{TimestreamSink, TimestreamSource};

use crate::schema::{CommonAttributes, QueryPage, WriteRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;

/// Server-side page size requested from the source.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// A database + table pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    /// Both identifiers are required; missing ones are a configuration error.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let database = database.into().trim().to_string();
        let table = table.into().trim().to_string();
        if database.is_empty() {
            return Err(Error::Config("database name is missing".to_string()));
        }
        if table.is_empty() {
            return Err(Error::Config("table name is missing".to_string()));
        }
        Ok(Self { database, table })
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\".\"{}\"", self.database, self.table)
    }
}

/// Forward-only cursor over the pages of one query.
#[async_trait]
pub trait PageCursor: Send {
    /// Next page, or `None` once the result is exhausted.
    async fn next_page(&mut self) -> Result<Option<QueryPage>>;
}

/// A queryable time-series store.
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Start `sql` with server-side pagination of `page_size` rows.
    async fn query(&self, sql: &str, page_size: u32) -> Result<Box<dyn PageCursor>>;
}

/// One record the sink refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Index of the record inside the submitted call
    pub index: usize,
    pub reason: String,
}

/// Result of a write call that reached the sink.
///
/// A non-empty `rejected` list is not a failure: every record not listed
/// was written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub rejected: Vec<RejectedRecord>,
}

impl WriteOutcome {
    pub fn accepted() -> Self {
        Self::default()
    }

    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// A writable time-series store.
#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    /// Fails with [`Error::Precondition`] when the table does not exist.
    async fn describe_table(&self, table: &TableRef) -> Result<()>;

    /// Submit at most [`crate::schema::MAX_RECORDS_PER_WRITE`] records.
    ///
    /// Content rejections come back in the outcome; `Err` means the call
    /// itself failed.
    async fn write_records(
        &self,
        table: &TableRef,
        records: &[WriteRecord],
        common: Option<&CommonAttributes>,
    ) -> Result<WriteOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_requires_both_names() {
        assert!(matches!(TableRef::new("", "tb"), Err(Error::Config(_))));
        assert!(matches!(TableRef::new("db", "  "), Err(Error::Config(_))));
        let table = TableRef::new(" db ", "tb").unwrap();
        assert_eq!(table.database, "db");
        assert_eq!(table.to_string(), "\"db\".\"tb\"");
    }
}
