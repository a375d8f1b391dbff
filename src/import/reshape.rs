//! Columnar row → write record conversion

use crate::schema::{
    CellKind, ColumnInfo, Dimension, Row, TimeUnit, WriteRecord, MEASURE_NAME_COLUMN,
    MEASURE_VALUE_PREFIX, TIME_COLUMN,
};
use chrono::{DateTime, NaiveDateTime};
use std::fmt;
use tracing::{debug, info};

/// Layouts accepted for the `time` column, all read as UTC.
const TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Why a row was left out of the import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssueKind {
    /// Cell count differs from the column count
    CellCount { cells: usize, columns: usize },
    /// The `time` cell could not be read as a UTC timestamp
    UnparseableTime(String),
    /// A scalar cell sits in a column without a scalar type
    MissingScalarType(String),
}

/// A row excluded from the import, with its position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub row: usize,
    pub kind: RowIssueKind,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RowIssueKind::CellCount { cells, columns } => write!(
                f,
                "row {}: {} cells for {} columns",
                self.row, cells, columns
            ),
            RowIssueKind::UnparseableTime(raw) => {
                write!(f, "row {}: unparseable time '{}'", self.row, raw)
            }
            RowIssueKind::MissingScalarType(column) => write!(
                f,
                "row {}: column '{}' has no scalar type",
                self.row, column
            ),
        }
    }
}

/// Parse a UTC date-time string to epoch milliseconds, dropping any digit
/// past the millisecond.
pub fn parse_time_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    for format in TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.timestamp_millis())
}

/// Build the write record of one row.
///
/// `row_index` only labels the issue when the row is rejected.
pub fn reshape_row(
    columns: &[ColumnInfo],
    row: &Row,
    row_index: usize,
) -> Result<WriteRecord, RowIssue> {
    let issue = |kind| RowIssue {
        row: row_index,
        kind,
    };
    if row.data.len() != columns.len() {
        return Err(issue(RowIssueKind::CellCount {
            cells: row.data.len(),
            columns: columns.len(),
        }));
    }

    let mut record = WriteRecord {
        time_unit: TimeUnit::Milliseconds,
        ..Default::default()
    };

    for (column, datum) in columns.iter().zip(&row.data) {
        let value = match datum.kind() {
            CellKind::Scalar(value) => value,
            CellKind::Null => {
                debug!(row = row_index, column = %column.name, "Skipping null cell");
                continue;
            }
            CellKind::Unsupported(kind) => {
                info!(row = row_index, column = %column.name, kind, "Ignoring unsupported cell type");
                continue;
            }
        };

        let name = column.name.as_str();
        if name == TIME_COLUMN {
            let millis = parse_time_millis(value)
                .ok_or_else(|| issue(RowIssueKind::UnparseableTime(value.to_string())))?;
            record.time = Some(millis);
        } else if name == MEASURE_NAME_COLUMN {
            record.measure_name = Some(value.to_string());
        } else {
            let scalar_type = column
                .scalar_type()
                .ok_or_else(|| issue(RowIssueKind::MissingScalarType(column.name.clone())))?;
            if name.starts_with(MEASURE_VALUE_PREFIX) {
                record.measure_value = Some(value.to_string());
                record.measure_value_type = Some(scalar_type.to_string());
            } else {
                record
                    .dimensions
                    .push(Dimension::new(name, value, scalar_type));
            }
        }
    }

    Ok(record)
}
