//! Object key layouts.
//!
//! Every key written by this crate is built here from structured fields so
//! padding and ordering never drift between writers.

use crate::timeseries::TableRef;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::fmt;

/// Format of the export timestamp embedded in dump keys.
const DUMP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Width of the zero-padded chunk number.
const CHUNK_DIGITS: usize = 8;

/// Token used in dump keys when the export was not filtered.
pub const UNFILTERED: &str = "none";

/// Key of one exported chunk:
/// `timestream.<db>.<table>.<filter|none>.<timestamp>.dump.<chunk:08>.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpKey {
    prefix: String,
    chunk: u32,
}

impl DumpKey {
    /// Prefix shared by every chunk of one export run.
    pub fn prefix(source: &TableRef, filter: Option<&str>, started_at: DateTime<Utc>) -> String {
        format!(
            "timestream.{}.{}.{}.{}.dump",
            source.database,
            source.table,
            filter.unwrap_or(UNFILTERED),
            started_at.format(DUMP_TIMESTAMP_FORMAT)
        )
    }

    pub fn new(prefix: impl Into<String>, chunk: u32) -> Self {
        Self {
            prefix: prefix.into(),
            chunk,
        }
    }

    pub fn chunk(&self) -> u32 {
        self.chunk
    }
}

impl fmt::Display for DumpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}.json",
            self.prefix,
            self.chunk,
            width = CHUNK_DIGITS
        )
    }
}

/// Whether a listed key looks like a JSON document worth publishing.
pub fn is_json_key(key: &str) -> bool {
    key.ends_with(".json")
}

/// Archive key for an inspected telemetry payload:
/// `YYYY/MM/DD/<gateway>/<device>/<epoch>.json`
pub fn archive_key(date: NaiveDate, gateway: &str, device: &str, epoch: &str) -> String {
    format!(
        "{:04}/{:02}/{:02}/{}/{}/{}.json",
        date.year(),
        date.month(),
        date.day(),
        gateway,
        device,
        epoch
    )
}

/// Key for a raw payload stored as received: `<unix nanos>.json`
pub fn raw_payload_key(nanos: i64) -> String {
    format!("{}.json", nanos)
}

/// Key for a dead-lettered event stored as received: `<unix nanos>`
pub fn deadletter_key(nanos: i64) -> String {
    nanos.to_string()
}

/// Key for a failed transformation: `lambda-<function>/<unix ms>.json`
pub fn failure_key(function_name: &str, millis: i64) -> String {
    format!("lambda-{}/{}.json", function_name, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn test_dump_key_layout() {
        let source = TableRef::new("iot", "telemetry").unwrap();
        let prefix = DumpKey::prefix(&source, Some("2022-01-01"), started());
        assert_eq!(prefix, "timestream.iot.telemetry.2022-01-01.2022-03-04T05-06-07.dump");

        let key = DumpKey::new(prefix, 3);
        assert_eq!(
            key.to_string(),
            "timestream.iot.telemetry.2022-01-01.2022-03-04T05-06-07.dump.00000003.json"
        );
        assert_eq!(key.chunk(), 3);
    }

    #[test]
    fn test_dump_key_unfiltered_and_wide_chunk() {
        let source = TableRef::new("db", "tb").unwrap();
        let key = DumpKey::new(DumpKey::prefix(&source, None, started()), 123_456_789);
        assert_eq!(
            key.to_string(),
            "timestream.db.tb.none.2022-03-04T05-06-07.dump.123456789.json"
        );
    }

    #[test]
    fn test_dump_keys_sort_in_chunk_order() {
        let source = TableRef::new("db", "tb").unwrap();
        let prefix = DumpKey::prefix(&source, None, started());
        let mut keys: Vec<String> = [10u32, 2, 1]
            .iter()
            .map(|n| DumpKey::new(prefix.clone(), *n).to_string())
            .collect();
        keys.sort();
        assert!(keys[0].ends_with("00000001.json"));
        assert!(keys[2].ends_with("00000010.json"));
    }

    #[test]
    fn test_archive_key_pads_date() {
        let date = NaiveDate::from_ymd_opt(2021, 7, 9).unwrap();
        assert_eq!(
            archive_key(date, "gw-1", "pump", "1625788800000"),
            "2021/07/09/gw-1/pump/1625788800000.json"
        );
    }

    #[test]
    fn test_misc_keys() {
        assert_eq!(raw_payload_key(42), "42.json");
        assert_eq!(deadletter_key(42), "42");
        assert_eq!(failure_key("iot-to-sns", 1000), "lambda-iot-to-sns/1000.json");
        assert!(is_json_key("a/b.json"));
        assert!(!is_json_key("a/b.json.tmp"));
    }
}
