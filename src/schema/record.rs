//! Time-series write records.

use serde::{Deserialize, Serialize};

/// Hard ceiling on records per write call imposed by the sink.
pub const MAX_RECORDS_PER_WRITE: usize = 100;

/// Resolution of a record timestamp. Records built here are always
/// milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeUnit {
    #[default]
    Milliseconds,
    Seconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Microseconds => "MICROSECONDS",
            TimeUnit::Nanoseconds => "NANOSECONDS",
        }
    }
}

/// A non-measure, non-time attribute of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
    pub value_type: String,
}

impl Dimension {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        value_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            value_type: value_type.into(),
        }
    }

    pub fn varchar(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value, "VARCHAR")
    }
}

/// One record submitted to the time-series sink.
///
/// Measure fields stay `None` when the source row carried no such column;
/// the sink decides whether that is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRecord {
    pub dimensions: Vec<Dimension>,
    pub measure_name: Option<String>,
    pub measure_value: Option<String>,
    pub measure_value_type: Option<String>,
    /// Timestamp in `time_unit` since the Unix epoch.
    pub time: Option<i64>,
    pub time_unit: TimeUnit,
}

impl WriteRecord {
    pub fn measure(
        name: impl Into<String>,
        value: impl Into<String>,
        value_type: impl Into<String>,
    ) -> Self {
        Self {
            measure_name: Some(name.into()),
            measure_value: Some(value.into()),
            measure_value_type: Some(value_type.into()),
            ..Default::default()
        }
    }
}

/// Attributes shared by every record of one write call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonAttributes {
    pub dimensions: Vec<Dimension>,
    pub time: Option<i64>,
    pub time_unit: TimeUnit,
}
