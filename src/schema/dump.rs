//! Query pages and dump documents.
//!
//! Field names follow the Timestream query result shape (`ColumnInfo`,
//! `Rows`, `Data`, `ScalarValue`, ...) so dump documents stay readable by
//! any tool that understands that format.

use serde::{Deserialize, Serialize};

/// Reserved column holding the row timestamp.
pub const TIME_COLUMN: &str = "time";
/// Reserved column holding the measure name.
pub const MEASURE_NAME_COLUMN: &str = "measure_name";
/// Prefix shared by every measure value column (`measure_value::double`, ...).
pub const MEASURE_VALUE_PREFIX: &str = "measure_value";

/// Semantic type of a column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar_type: Option<String>,
}

/// Name and type of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default)]
    pub r#type: ColumnType,
}

impl ColumnInfo {
    pub fn scalar(name: impl Into<String>, scalar_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            r#type: ColumnType {
                scalar_type: Some(scalar_type.into()),
            },
        }
    }

    pub fn scalar_type(&self) -> Option<&str> {
        self.r#type.scalar_type.as_deref()
    }
}

/// One result cell.
///
/// Exactly one field is expected to be set. Only scalar and null cells can be
/// re-imported; the other kinds are carried through exports untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Datum {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_series_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_value: Option<serde_json::Value>,
}

/// Classification of a [`Datum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind<'a> {
    Scalar(&'a str),
    Null,
    Unsupported(&'static str),
}

impl Datum {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            scalar_value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn null() -> Self {
        Self {
            null_value: Some(true),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> CellKind<'_> {
        if let Some(value) = self.scalar_value.as_deref() {
            return CellKind::Scalar(value);
        }
        if self.null_value == Some(true) {
            return CellKind::Null;
        }
        if self.time_series_value.is_some() {
            return CellKind::Unsupported("TimeSeriesValue");
        }
        if self.array_value.is_some() {
            return CellKind::Unsupported("ArrayValue");
        }
        if self.row_value.is_some() {
            return CellKind::Unsupported("RowValue");
        }
        CellKind::Unsupported("Empty")
    }
}

/// One result row, cells aligned positionally with the page's `ColumnInfo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Row {
    pub data: Vec<Datum>,
}

impl Row {
    pub fn new(data: Vec<Datum>) -> Self {
        Self { data }
    }
}

/// One page of paginated query output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryPage {
    pub column_info: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
}

impl QueryPage {
    pub fn new(column_info: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self { column_info, rows }
    }
}

/// Rows of up to `BLOCKSIZE` pages sharing the column layout of the first
/// page of the chunk.
///
/// The importer relies on every row of a document matching `column_info`;
/// nothing re-validates that per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpDocument {
    #[serde(rename = "Rows")]
    pub rows: Vec<Row>,
    #[serde(rename = "ColumnInfo")]
    pub column_info: Vec<ColumnInfo>,
}

impl DumpDocument {
    pub fn to_json_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_uses_timestream_field_names() {
        let doc = DumpDocument {
            rows: vec![Row::new(vec![Datum::scalar("cpu"), Datum::null()])],
            column_info: vec![
                ColumnInfo::scalar("measure_name", "VARCHAR"),
                ColumnInfo::scalar("region", "VARCHAR"),
            ],
        };

        let json: serde_json::Value = serde_json::from_slice(&doc.to_json_bytes().unwrap()).unwrap();
        assert_eq!(json["ColumnInfo"][0]["Name"], "measure_name");
        assert_eq!(json["ColumnInfo"][0]["Type"]["ScalarType"], "VARCHAR");
        assert_eq!(json["Rows"][0]["Data"][0]["ScalarValue"], "cpu");
        assert_eq!(json["Rows"][0]["Data"][1]["NullValue"], true);
        assert!(json["Rows"][0]["Data"][0].get("NullValue").is_none());
    }

    #[test]
    fn test_parses_existing_dump_format() {
        let raw = r#"{
            "Rows": [{"Data": [{"ScalarValue": "2022-01-01 00:00:00.000000000"}, {"NullValue": true}, {"ArrayValue": []}]}],
            "ColumnInfo": [
                {"Name": "time", "Type": {"ScalarType": "TIMESTAMP"}},
                {"Name": "site", "Type": {"ScalarType": "VARCHAR"}},
                {"Name": "tags", "Type": {"ArrayColumnInfo": {"Type": {"ScalarType": "VARCHAR"}}}}
            ]
        }"#;

        let doc = DumpDocument::from_json_slice(raw.as_bytes()).unwrap();
        assert_eq!(doc.column_info.len(), 3);
        assert_eq!(doc.column_info[2].scalar_type(), None);

        let cells = &doc.rows[0].data;
        assert_eq!(cells[0].kind(), CellKind::Scalar("2022-01-01 00:00:00.000000000"));
        assert_eq!(cells[1].kind(), CellKind::Null);
        assert_eq!(cells[2].kind(), CellKind::Unsupported("ArrayValue"));
    }

    #[test]
    fn test_false_null_value_is_not_null() {
        let cell: Datum = serde_json::from_str(r#"{"NullValue": false}"#).unwrap();
        assert_eq!(cell.kind(), CellKind::Unsupported("Empty"));

        let cell: Datum = serde_json::from_str(r#"{"NullValue": false, "ArrayValue": []}"#).unwrap();
        assert_eq!(cell.kind(), CellKind::Unsupported("ArrayValue"));
    }
}
