//! Export query construction and calendar-day filters.

use crate::timeseries::TableRef;
use crate::{Error, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Queue message body requesting the export of one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// One calendar day (UTC) selecting the rows of a partial export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayFilter(NaiveDate);

impl DayFilter {
    pub fn new(day: NaiveDate) -> Self {
        Self(day)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Every day from `start` to `end`, both included.
    pub fn range(start: DayFilter, end: DayFilter) -> Result<Vec<DayFilter>> {
        if end < start {
            return Err(Error::Config(format!(
                "END_DAY {} is before START_DAY {}",
                end, start
            )));
        }
        let mut days = Vec::new();
        let mut current = start.0;
        while current <= end.0 {
            days.push(DayFilter(current));
            current = current
                .checked_add_days(Days::new(1))
                .ok_or_else(|| Error::Config(format!("day after {} is out of range", current)))?;
        }
        Ok(days)
    }

    /// Body of the message asking for this day: `{"filter":"YYYY-MM-DD"}`
    pub fn to_request_body(&self) -> Result<String> {
        Ok(serde_json::to_string(&FilterRequest {
            filter: Some(self.to_string()),
        })?)
    }

    /// Read the day out of a request body. A body without a filter is an
    /// invalid message.
    pub fn from_request_body(body: &str) -> Result<Self> {
        let request: FilterRequest = serde_json::from_str(body)
            .map_err(|e| Error::InvalidMessage(format!("request body is not JSON: {}", e)))?;
        match request.filter.as_deref() {
            Some(day) if !day.trim().is_empty() => day.parse(),
            _ => Err(Error::InvalidMessage(format!(
                "request body carries no filter: {}",
                body
            ))),
        }
    }
}

impl FromStr for DayFilter {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        NaiveDate::parse_from_str(raw.trim(), DAY_FORMAT)
            .map(DayFilter)
            .map_err(|e| {
                Error::InvalidMessage(format!("day filter '{}' is not YYYY-MM-DD: {}", raw, e))
            })
    }
}

impl fmt::Display for DayFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

/// Select every column of `source`, optionally restricted to one day,
/// ordered by time ascending.
pub fn export_query(source: &TableRef, filter: Option<&DayFilter>) -> String {
    let mut sql = format!("SELECT * FROM {}", source);
    if let Some(day) = filter {
        sql.push_str(&format!(" WHERE date_trunc('day', time) = '{}'", day));
    }
    sql.push_str(" ORDER BY time ASC");
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_query_unfiltered() {
        let source = TableRef::new("iot", "telemetry").unwrap();
        assert_eq!(
            export_query(&source, None),
            "SELECT * FROM \"iot\".\"telemetry\" ORDER BY time ASC"
        );
    }

    #[test]
    fn test_export_query_filtered() {
        let source = TableRef::new("iot", "telemetry").unwrap();
        let day: DayFilter = "2022-01-01".parse().unwrap();
        assert_eq!(
            export_query(&source, Some(&day)),
            "SELECT * FROM \"iot\".\"telemetry\" WHERE date_trunc('day', time) = '2022-01-01' ORDER BY time ASC"
        );
    }

    #[test]
    fn test_day_filter_rejects_non_dates() {
        assert!("2022-13-01".parse::<DayFilter>().is_err());
        assert!("2022-01-01' OR 1=1 --".parse::<DayFilter>().is_err());
        assert!("".parse::<DayFilter>().is_err());
    }

    #[test]
    fn test_day_range_inclusive_across_month() {
        let days = DayFilter::range("2022-01-30".parse().unwrap(), "2022-02-02".parse().unwrap())
            .unwrap();
        let rendered: Vec<String> = days.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["2022-01-30", "2022-01-31", "2022-02-01", "2022-02-02"]
        );

        let single = DayFilter::range("2022-01-01".parse().unwrap(), "2022-01-01".parse().unwrap())
            .unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_request_body() {
        let day: DayFilter = "2022-01-01".parse().unwrap();
        assert_eq!(day.to_request_body().unwrap(), r#"{"filter":"2022-01-01"}"#);
        assert_eq!(
            DayFilter::from_request_body(r#"{"filter": "2022-01-01"}"#).unwrap(),
            day
        );
        for bad in ["{}", r#"{"filter":""}"#, "not json", r#"{"filter":"01/01/2022"}"#] {
            assert!(matches!(
                DayFilter::from_request_body(bad),
                Err(Error::InvalidMessage(_))
            ));
        }
    }

    #[test]
    fn test_day_range_rejects_reversed() {
        let err = DayFilter::range("2022-01-02".parse().unwrap(), "2022-01-01".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
