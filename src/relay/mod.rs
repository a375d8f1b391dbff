//! Relay functions around the export/import pipeline
//!
//! - [`day_filters`]: enqueue one export request per day of a range
//! - [`fanout`]: enqueue one import request per stored dump document
//! - [`archive`]: persist queued payloads and dead-lettered events
//! - [`iot`]: validate device payloads and publish them to a topic
//! - [`ingest`]: write a stored device payload to the time-series table

pub mod archive;
pub mod day_filters;
pub mod fanout;
pub mod ingest;
pub mod iot;
pub mod telemetry;

pub use archive::{DeadLetterArchiver, PayloadArchiver, RawPayloadArchiver};
pub use day_filters::DayFilterProducer;
pub use fanout::{DumpListPublisher, FanoutReport};
pub use ingest::{DeviceIngestor, DevicePayload, IngestReport};
pub use iot::{ForwardOutcome, IotForwarder};

use crate::messaging::{BatchFailures, QueueMessage};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info};

/// Per-message processing of an inbound queue batch.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Function name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Process one message.
    async fn handle(&self, message: &QueueMessage) -> Result<()>;

    /// Process every message of a batch and return the ones that failed.
    ///
    /// Only fatal errors abort the batch; any other failure is logged and
    /// leaves the message for redelivery.
    async fn handle_batch(&self, messages: &[QueueMessage]) -> Result<BatchFailures> {
        let function = self.name();
        telemetry::record_batch(function, messages.len() as u64);
        info!(function, messages = messages.len(), "Processing queue batch");

        let mut failures = BatchFailures::default();
        for message in messages {
            match self.handle(message).await {
                Ok(()) => {
                    debug!(function, message_id = %message.id, "Message processed");
                    telemetry::record_message(function, "success");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(function, message_id = %message.id, error = %e, "Error when processing a message");
                    telemetry::record_message(function, "error");
                    failures.push(message.id.clone());
                }
            }
        }

        if !failures.is_empty() {
            info!(function, failed = failures.len(), "Returning unprocessed messages");
        }
        Ok(failures)
    }
}

/// Truthiness of a JSON value: null, false, zero and empty values are not
/// considered present.
pub(crate) fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a scalar JSON value as text without quoting strings.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_is_present() {
        assert!(!is_present(&json!(null)));
        assert!(!is_present(&json!("")));
        assert!(!is_present(&json!({})));
        assert!(!is_present(&json!(0)));
        assert!(is_present(&json!({"a": 1})));
        assert!(is_present(&json!("gw")));
        assert!(is_present(&json!(12)));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("gw-1")), "gw-1");
        assert_eq!(value_text(&json!(1234)), "1234");
    }

    struct Picky;

    #[async_trait]
    impl MessageHandler for Picky {
        fn name(&self) -> &'static str {
            "picky"
        }

        async fn handle(&self, message: &QueueMessage) -> Result<()> {
            match message.require_body()? {
                "fatal" => Err(Error::Config("boom".into())),
                "ok" => Ok(()),
                other => Err(Error::InvalidPayload(other.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_batch_collects_failures() {
        let messages = vec![
            QueueMessage::with_body("1", "ok"),
            QueueMessage::with_body("2", "bad"),
            QueueMessage::with_body("3", "ok"),
            QueueMessage::default(),
        ];
        let failures = Picky.handle_batch(&messages).await.unwrap();
        assert_eq!(failures.message_ids, vec!["2".to_string(), String::new()]);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_batch() {
        let messages = vec![QueueMessage::with_body("1", "fatal")];
        assert!(Picky.handle_batch(&messages).await.is_err());
    }
}
