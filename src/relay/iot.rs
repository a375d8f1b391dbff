//! Device payload validation and topic publishing.

use super::telemetry;
use crate::clock::Clock;
use crate::messaging::Topic;
use crate::storage::keys::failure_key;
use crate::storage::{BucketResolver, ObjectRef};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

const FUNCTION: &str = "iot-to-sns";

/// Gateway data models this forwarder understands.
pub const SUPPORTED_DATA_MODELS: &[&str] = &["ekip0001"];
/// Data contract version stamped on published payloads.
pub const CONTRACT_VERSION: &str = "ekip0001";

const KEY_TIMESTAMP: &str = "timestamp";
const KEY_DATA: &str = "dataObject";
const KEY_DATA_MODEL: &str = "data_model";
const KEY_EPOCH: &str = "epoch_ms";
const KEY_SITE: &str = "site_name";
const KEY_DEVICE: &str = "device_name";
const KEY_CONTRACT: &str = "contract";

const EXPECTED_KEYS: [&str; 6] = [
    KEY_TIMESTAMP,
    KEY_DATA,
    KEY_EPOCH,
    KEY_SITE,
    KEY_DEVICE,
    KEY_DATA_MODEL,
];

/// Check that `payload` is a supported gateway message with exactly the
/// expected keys.
pub fn validate_payload(payload: &Value) -> Result<&Map<String, Value>> {
    let object = payload.as_object().ok_or_else(|| {
        Error::InvalidPayload(format!(
            "the payload should be an object but {} was received",
            kind_of(payload)
        ))
    })?;

    let model = object.get(KEY_DATA_MODEL).and_then(Value::as_str);
    if !model.is_some_and(|m| SUPPORTED_DATA_MODELS.contains(&m)) {
        return Err(Error::InvalidPayload(format!(
            "unsupported version of the incoming data model: {}",
            object.get(KEY_DATA_MODEL).unwrap_or(&Value::Null)
        )));
    }

    let received: BTreeSet<&str> = object.keys().map(String::as_str).collect();
    let expected: BTreeSet<&str> = EXPECTED_KEYS.iter().copied().collect();
    if received != expected {
        return Err(Error::InvalidPayload(format!(
            "payload keys do not match the expected keys. Received keys: {:?} / Expected keys: {:?}",
            received, expected
        )));
    }
    Ok(object)
}

/// Validate, then drop the gateway-only keys and stamp the contract
/// version.
pub fn adjust_payload(payload: &Value) -> Result<Map<String, Value>> {
    let mut adjusted = validate_payload(payload)?.clone();
    adjusted.remove(KEY_TIMESTAMP);
    adjusted.remove(KEY_DATA_MODEL);
    adjusted.insert(
        KEY_CONTRACT.to_string(),
        Value::String(CONTRACT_VERSION.to_string()),
    );
    Ok(adjusted)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Record stored when a payload cannot be forwarded.
#[derive(Debug, Serialize)]
struct FailureRecord {
    error: String,
    /// The triggering event, serialized
    event: String,
}

/// What happened to a forwarded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Published { message_id: String },
    DeadLettered { key: String },
}

/// Publishes device payloads to a topic, diverting failures to a
/// dead-letter bucket.
pub struct IotForwarder {
    topic: Arc<dyn Topic>,
    buckets: Arc<dyn BucketResolver>,
    dead_letter_bucket: String,
    function_name: String,
    clock: Arc<dyn Clock>,
}

impl IotForwarder {
    pub fn new(
        topic: Arc<dyn Topic>,
        buckets: Arc<dyn BucketResolver>,
        dead_letter_bucket: impl Into<String>,
        function_name: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            topic,
            buckets,
            dead_letter_bucket: dead_letter_bucket.into(),
            function_name: function_name.into(),
            clock,
        }
    }

    /// Forward one event. Errors only when the event could neither be
    /// published nor dead-lettered.
    pub async fn forward(&self, event: &Value) -> Result<ForwardOutcome> {
        debug!(event = %event, "Received event");
        match self.publish(event).await {
            Ok(message_id) => {
                telemetry::record_published(FUNCTION, 1);
                Ok(ForwardOutcome::Published { message_id })
            }
            Err(e) => {
                error!(error = %e, "Payload not forwarded");
                let key = self.dead_letter(event, &e).await?;
                telemetry::record_dead_lettered(FUNCTION);
                Ok(ForwardOutcome::DeadLettered { key })
            }
        }
    }

    async fn publish(&self, event: &Value) -> Result<String> {
        let adjusted = adjust_payload(event)?;
        let message = serde_json::to_string(&adjusted)?;
        debug!(message = %message, "Publishing to topic");
        let message_id = self.topic.publish(message).await?;
        info!(message_id = %message_id, "Payload published");
        Ok(message_id)
    }

    async fn dead_letter(&self, event: &Value, cause: &Error) -> Result<String> {
        let record = FailureRecord {
            error: cause.to_string(),
            event: event.to_string(),
        };
        let key = failure_key(&self.function_name, self.clock.now_millis());
        let object = ObjectRef::new(self.dead_letter_bucket.clone(), key.clone());
        self.buckets
            .put(&object, serde_json::to_vec(&record)?)
            .await?;
        info!(object = %object, "Details stored to dead-letter bucket");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::messaging::InMemoryTopic;
    use crate::storage::MemoryBuckets;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "timestamp": "2022-01-01T00:00:00+0000",
            "dataObject": {"temp": 21.5},
            "epoch_ms": 1640995200000i64,
            "site_name": "plant-1",
            "device_name": "breaker-7",
            "data_model": "ekip0001"
        })
    }

    fn forwarder(topic: Arc<InMemoryTopic>) -> (IotForwarder, Arc<MemoryBuckets>) {
        let buckets = Arc::new(MemoryBuckets::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
        ));
        let forwarder = IotForwarder::new(topic, buckets.clone(), "dead", "iot-fn", clock);
        (forwarder, buckets)
    }

    #[test]
    fn test_adjust_payload() {
        let adjusted = adjust_payload(&payload()).unwrap();
        let keys: BTreeSet<&str> = adjusted.keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> =
            ["contract", "dataObject", "device_name", "epoch_ms", "site_name"].into();
        assert_eq!(keys, expected);
        assert_eq!(adjusted["contract"], "ekip0001");
    }

    #[test]
    fn test_validation_failures() {
        assert!(validate_payload(&json!([1, 2])).is_err());

        let mut wrong_model = payload();
        wrong_model["data_model"] = json!("ekip0002");
        let err = validate_payload(&wrong_model).unwrap_err();
        assert!(err.to_string().contains("data model"));

        let mut extra = payload();
        extra["firmware"] = json!("1.0");
        assert!(validate_payload(&extra).is_err());

        let mut missing = payload();
        missing.as_object_mut().unwrap().remove("site_name");
        assert!(validate_payload(&missing).is_err());
    }

    #[tokio::test]
    async fn test_forward_publishes_adjusted_payload() {
        let topic = Arc::new(InMemoryTopic::new());
        let (forwarder, buckets) = forwarder(topic.clone());

        let outcome = forwarder.forward(&payload()).await.unwrap();
        assert!(matches!(outcome, ForwardOutcome::Published { .. }));

        let published: Value = serde_json::from_str(&topic.published()[0]).unwrap();
        assert!(published.get("timestamp").is_none());
        assert_eq!(published["contract"], "ekip0001");
        assert!(buckets.list("dead").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_payload_is_dead_lettered() {
        let topic = Arc::new(InMemoryTopic::new());
        let (forwarder, buckets) = forwarder(topic.clone());

        let event = json!({"data_model": "other"});
        let outcome = forwarder.forward(&event).await.unwrap();
        let ForwardOutcome::DeadLettered { key } = outcome else {
            panic!("expected dead-lettering");
        };
        assert_eq!(key, "lambda-iot-fn/1640995200000.json");
        assert!(topic.published().is_empty());

        let stored = buckets.get(&ObjectRef::new("dead", key)).await.unwrap();
        let stored: Value = serde_json::from_slice(&stored).unwrap();
        assert!(stored["error"].as_str().unwrap().contains("data model"));
        assert_eq!(stored["event"], event.to_string());
    }

    #[tokio::test]
    async fn test_unavailable_topic_is_dead_lettered() {
        let (forwarder, buckets) = forwarder(Arc::new(InMemoryTopic::unavailable()));
        let outcome = forwarder.forward(&payload()).await.unwrap();
        assert!(matches!(outcome, ForwardOutcome::DeadLettered { .. }));
        assert_eq!(buckets.list("dead").await.unwrap().len(), 1);
    }
}
