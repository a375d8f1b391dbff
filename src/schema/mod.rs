//! Data shapes moved between stages
//!
//! - [`dump`]: columnar query pages and the dump documents built from them
//! - [`record`]: row-oriented time-series write records

mod dump;
mod record;

pub use dump::{
    CellKind, ColumnInfo, ColumnType, Datum, DumpDocument, QueryPage, Row, MEASURE_NAME_COLUMN,
    MEASURE_VALUE_PREFIX, TIME_COLUMN,
};
pub use record::{CommonAttributes, Dimension, TimeUnit, WriteRecord, MAX_RECORDS_PER_WRITE};
