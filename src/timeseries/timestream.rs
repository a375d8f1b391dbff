//! Amazon Timestream adapters.
//!
//! Both clients require endpoint discovery; the reload task keeps the
//! discovered endpoint fresh for the lifetime of the process.

use super::{
    PageCursor, RejectedRecord, TableRef, TimeSeriesSink, TimeSeriesSource, WriteOutcome,
};
use crate::schema::{
    ColumnInfo, ColumnType, CommonAttributes, Datum, Dimension, QueryPage, Row, TimeUnit,
    WriteRecord,
};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_timestreamquery as tsq;
use aws_sdk_timestreamwrite as tsw;
use tracing::{debug, info};
use tsw::operation::write_records::WriteRecordsError;

/// Query side, reading pages with `NextToken` pagination.
pub struct TimestreamSource {
    client: tsq::Client,
}

impl TimestreamSource {
    pub async fn connect(config: &aws_config::SdkConfig) -> Result<Self> {
        let (client, reload) = tsq::Client::new(config)
            .with_endpoint_discovery_enabled()
            .await
            .map_err(|e| {
                Error::Config(format!("Timestream query endpoint discovery failed: {e}"))
            })?;
        tokio::spawn(reload.reload_task());
        info!("Timestream query client ready");
        Ok(Self { client })
    }
}

struct TimestreamCursor {
    client: tsq::Client,
    sql: String,
    page_size: i32,
    next_token: Option<String>,
    finished: bool,
}

#[async_trait]
impl PageCursor for TimestreamCursor {
    async fn next_page(&mut self) -> Result<Option<QueryPage>> {
        if self.finished {
            return Ok(None);
        }
        let output = self
            .client
            .query()
            .query_string(&self.sql)
            .max_rows(self.page_size)
            .set_next_token(self.next_token.take())
            .send()
            .await
            .map_err(|e| Error::Query(tsq::error::DisplayErrorContext(&e).to_string()))?;

        self.next_token = output.next_token().map(str::to_string);
        self.finished = self.next_token.is_none();

        let column_info = output.column_info().iter().map(convert_column).collect();
        let rows = output
            .rows()
            .iter()
            .map(|row| Row::new(row.data().iter().map(convert_datum).collect()))
            .collect();
        Ok(Some(QueryPage::new(column_info, rows)))
    }
}

fn convert_column(column: &tsq::types::ColumnInfo) -> ColumnInfo {
    ColumnInfo {
        name: column.name().unwrap_or_default().to_string(),
        r#type: ColumnType {
            scalar_type: column
                .r#type()
                .and_then(|t| t.scalar_type())
                .map(|s| s.as_str().to_string()),
        },
    }
}

fn convert_datum(datum: &tsq::types::Datum) -> Datum {
    if let Some(value) = datum.scalar_value() {
        return Datum::scalar(value);
    }
    if datum.null_value() == Some(true) {
        return Datum::null();
    }
    // Nested kinds cannot be re-imported; keep a readable trace of them.
    let nested = serde_json::Value::String(format!("{:?}", datum));
    if datum.time_series_value.is_some() {
        Datum {
            time_series_value: Some(nested),
            ..Default::default()
        }
    } else if datum.array_value.is_some() {
        Datum {
            array_value: Some(nested),
            ..Default::default()
        }
    } else if datum.row_value.is_some() {
        Datum {
            row_value: Some(nested),
            ..Default::default()
        }
    } else {
        Datum::default()
    }
}

#[async_trait]
impl TimeSeriesSource for TimestreamSource {
    async fn query(&self, sql: &str, page_size: u32) -> Result<Box<dyn PageCursor>> {
        debug!(sql = %sql, page_size, "Starting Timestream query");
        Ok(Box::new(TimestreamCursor {
            client: self.client.clone(),
            sql: sql.to_string(),
            page_size: i32::try_from(page_size).unwrap_or(i32::MAX),
            next_token: None,
            finished: false,
        }))
    }
}

/// Write side.
pub struct TimestreamSink {
    client: tsw::Client,
}

impl TimestreamSink {
    pub async fn connect(config: &aws_config::SdkConfig) -> Result<Self> {
        let (client, reload) = tsw::Client::new(config)
            .with_endpoint_discovery_enabled()
            .await
            .map_err(|e| {
                Error::Config(format!("Timestream write endpoint discovery failed: {e}"))
            })?;
        tokio::spawn(reload.reload_task());
        info!("Timestream write client ready");
        Ok(Self { client })
    }
}

fn convert_time_unit(unit: TimeUnit) -> tsw::types::TimeUnit {
    match unit {
        TimeUnit::Milliseconds => tsw::types::TimeUnit::Milliseconds,
        TimeUnit::Seconds => tsw::types::TimeUnit::Seconds,
        TimeUnit::Microseconds => tsw::types::TimeUnit::Microseconds,
        TimeUnit::Nanoseconds => tsw::types::TimeUnit::Nanoseconds,
    }
}

fn convert_dimension(dimension: &Dimension) -> Result<tsw::types::Dimension> {
    tsw::types::Dimension::builder()
        .name(&dimension.name)
        .value(&dimension.value)
        .dimension_value_type(tsw::types::DimensionValueType::from(
            dimension.value_type.as_str(),
        ))
        .build()
        .map_err(|e| Error::Write(format!("invalid dimension '{}': {}", dimension.name, e)))
}

fn convert_dimensions(dimensions: &[Dimension]) -> Result<Vec<tsw::types::Dimension>> {
    dimensions.iter().map(convert_dimension).collect()
}

fn convert_record(record: &WriteRecord) -> Result<tsw::types::Record> {
    Ok(tsw::types::Record::builder()
        .set_dimensions(Some(convert_dimensions(&record.dimensions)?))
        .set_measure_name(record.measure_name.clone())
        .set_measure_value(record.measure_value.clone())
        .set_measure_value_type(
            record
                .measure_value_type
                .as_deref()
                .map(tsw::types::MeasureValueType::from),
        )
        .set_time(record.time.map(|t| t.to_string()))
        .time_unit(convert_time_unit(record.time_unit))
        .build())
}

fn convert_common(common: &CommonAttributes) -> Result<tsw::types::Record> {
    Ok(tsw::types::Record::builder()
        .set_dimensions(Some(convert_dimensions(&common.dimensions)?))
        .set_time(common.time.map(|t| t.to_string()))
        .time_unit(convert_time_unit(common.time_unit))
        .build())
}

#[async_trait]
impl TimeSeriesSink for TimestreamSink {
    async fn describe_table(&self, table: &TableRef) -> Result<()> {
        self.client
            .describe_table()
            .database_name(&table.database)
            .table_name(&table.table)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                Error::Precondition(format!(
                    "cannot describe table {}: {}",
                    table,
                    tsw::error::DisplayErrorContext(&e)
                ))
            })
    }

    async fn write_records(
        &self,
        table: &TableRef,
        records: &[WriteRecord],
        common: Option<&CommonAttributes>,
    ) -> Result<WriteOutcome> {
        let converted = records
            .iter()
            .map(convert_record)
            .collect::<Result<Vec<_>>>()?;
        let common = common.map(convert_common).transpose()?;

        let result = self
            .client
            .write_records()
            .database_name(&table.database)
            .table_name(&table.table)
            .set_records(Some(converted))
            .set_common_attributes(common)
            .send()
            .await;

        match result {
            Ok(_) => Ok(WriteOutcome::accepted()),
            Err(err) => match err.as_service_error() {
                Some(WriteRecordsError::RejectedRecordsException(rejection)) => {
                    let rejected = rejection
                        .rejected_records()
                        .iter()
                        .map(|r| RejectedRecord {
                            index: usize::try_from(r.record_index()).unwrap_or_default(),
                            reason: r.reason().unwrap_or("unspecified").to_string(),
                        })
                        .collect();
                    Ok(WriteOutcome { rejected })
                }
                _ => Err(Error::Write(
                    tsw::error::DisplayErrorContext(&err).to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_record_carries_all_fields() {
        let mut record = WriteRecord::measure("temperature", "21.5", "DOUBLE");
        record.time = Some(1_640_995_200_123);
        record.dimensions.push(Dimension::varchar("site", "north"));

        let converted = convert_record(&record).unwrap();
        assert_eq!(converted.measure_name(), Some("temperature"));
        assert_eq!(converted.measure_value(), Some("21.5"));
        assert_eq!(
            converted.measure_value_type(),
            Some(&tsw::types::MeasureValueType::Double)
        );
        assert_eq!(converted.time(), Some("1640995200123"));
        assert_eq!(
            converted.time_unit(),
            Some(&tsw::types::TimeUnit::Milliseconds)
        );
        assert_eq!(converted.dimensions().len(), 1);
        assert_eq!(converted.dimensions()[0].name(), "site");
    }

    #[test]
    fn test_convert_datum_kinds() {
        let scalar = tsq::types::Datum::builder().scalar_value("42").build();
        assert_eq!(convert_datum(&scalar), Datum::scalar("42"));

        let null = tsq::types::Datum::builder().null_value(true).build();
        assert_eq!(convert_datum(&null), Datum::null());
    }
}
