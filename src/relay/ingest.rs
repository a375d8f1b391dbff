//! Stored device payload → time-series records.

use super::archive::epoch_millis;
use super::{telemetry, value_text};
use crate::schema::{CommonAttributes, Dimension, TimeUnit, WriteRecord, MAX_RECORDS_PER_WRITE};
use crate::storage::{BucketResolver, ObjectRef};
use crate::timeseries::{TableRef, TimeSeriesSink};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

const FUNCTION: &str = "s3-to-timestream";

/// A device reading as stored by the archive relays.
#[derive(Debug, Clone, Deserialize)]
pub struct DevicePayload {
    pub thing: Value,
    pub device: Value,
    pub epoch_ms: Value,
    pub values: Map<String, Value>,
}

impl DevicePayload {
    /// Shared gateway/device dimensions and timestamp, plus one record per
    /// value.
    ///
    /// Integers become `BIGINT` measures, other numbers `DOUBLE`. Non-numeric
    /// values are refused.
    pub fn to_records(&self) -> Result<(CommonAttributes, Vec<WriteRecord>)> {
        let common = CommonAttributes {
            dimensions: vec![
                Dimension::varchar("Gateway", value_text(&self.thing)),
                Dimension::varchar("deviceName", value_text(&self.device)),
            ],
            time: Some(epoch_millis(&self.epoch_ms)?),
            time_unit: TimeUnit::Milliseconds,
        };

        let records = self
            .values
            .iter()
            .map(|(name, value)| {
                let Value::Number(number) = value else {
                    return Err(Error::InvalidPayload(format!(
                        "value '{}' is not a number: {}",
                        name, value
                    )));
                };
                let value_type = if number.is_i64() || number.is_u64() {
                    "BIGINT"
                } else {
                    "DOUBLE"
                };
                Ok(WriteRecord::measure(name, number.to_string(), value_type))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((common, records))
    }
}

/// Counts of one ingested object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub records: usize,
    pub rejected: usize,
    pub write_calls: usize,
}

/// Writes stored device payloads to a time-series table.
pub struct DeviceIngestor {
    buckets: Arc<dyn BucketResolver>,
    sink: Arc<dyn TimeSeriesSink>,
    table: TableRef,
}

impl DeviceIngestor {
    pub fn new(
        buckets: Arc<dyn BucketResolver>,
        sink: Arc<dyn TimeSeriesSink>,
        table: TableRef,
    ) -> Self {
        Self {
            buckets,
            sink,
            table,
        }
    }

    pub async fn ingest(&self, object: &ObjectRef) -> Result<IngestReport> {
        let bytes = self.buckets.get(object).await?;
        let payload: DevicePayload = serde_json::from_slice(&bytes).map_err(|e| {
            Error::InvalidPayload(format!("{} is not a device payload: {}", object, e))
        })?;
        info!(object = %object, values = payload.values.len(), "New device data received");

        let (common, records) = payload.to_records()?;
        let mut report = IngestReport::default();
        for batch in records.chunks(MAX_RECORDS_PER_WRITE) {
            let outcome = self
                .sink
                .write_records(&self.table, batch, Some(&common))
                .await?;
            report.write_calls += 1;
            report.records += batch.len();
            for rejected in &outcome.rejected {
                warn!(
                    index = rejected.index,
                    reason = %rejected.reason,
                    "Rejected record; other records were written"
                );
            }
            report.rejected += outcome.rejected.len();
        }
        telemetry::record_message(FUNCTION, "success");

        info!(
            records = report.records,
            rejected = report.rejected,
            write_calls = report.write_calls,
            "Finished without error"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::InMemorySink;
    use crate::storage::MemoryBuckets;
    use serde_json::json;

    fn payload(values: Value) -> DevicePayload {
        serde_json::from_value(json!({
            "thing": "gw-1",
            "device": "pump",
            "epoch_ms": 1640995200000i64,
            "values": values
        }))
        .unwrap()
    }

    #[test]
    fn test_records_and_types() {
        let (common, records) = payload(json!({"count": 3, "temp": 21.5}))
            .to_records()
            .unwrap();
        assert_eq!(
            common.dimensions,
            vec![
                Dimension::varchar("Gateway", "gw-1"),
                Dimension::varchar("deviceName", "pump")
            ]
        );
        assert_eq!(common.time, Some(1_640_995_200_000));

        let count = records
            .iter()
            .find(|r| r.measure_name.as_deref() == Some("count"))
            .unwrap();
        assert_eq!(count.measure_value.as_deref(), Some("3"));
        assert_eq!(count.measure_value_type.as_deref(), Some("BIGINT"));
        let temp = records
            .iter()
            .find(|r| r.measure_name.as_deref() == Some("temp"))
            .unwrap();
        assert_eq!(temp.measure_value_type.as_deref(), Some("DOUBLE"));
    }

    #[test]
    fn test_non_numeric_value_is_refused() {
        let err = payload(json!({"state": "open"})).to_records().unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_ingest_chunks_writes() {
        let table = TableRef::new("iot", "readings").unwrap();
        let sink = Arc::new(InMemorySink::new().with_table(table.clone()));
        let buckets = Arc::new(MemoryBuckets::new());

        let values: Map<String, Value> = (0..150).map(|i| (format!("v{i}"), json!(i))).collect();
        let object = ObjectRef::new("archive", "2022/01/01/gw-1/pump/1640995200000.json");
        let body = json!({"thing": "gw-1", "device": "pump", "epoch_ms": 1640995200000i64, "values": values});
        buckets
            .put(&object, serde_json::to_vec(&body).unwrap())
            .await
            .unwrap();

        let ingestor = DeviceIngestor::new(buckets, sink.clone(), table);
        let report = ingestor.ingest(&object).await.unwrap();
        assert_eq!(report.records, 150);
        assert_eq!(report.write_calls, 2);

        let calls = sink.calls();
        assert_eq!(calls[0].records.len(), 100);
        assert_eq!(calls[1].records.len(), 50);
        assert!(calls.iter().all(|c| c.common.as_ref().and_then(|c| c.time) == Some(1_640_995_200_000)));
    }
}
