//! Payload archiving: queued payloads and dead-lettered events to object
//! storage.

use super::{is_present, telemetry, value_text, MessageHandler};
use crate::clock::Clock;
use crate::messaging::QueueMessage;
use crate::storage::keys::{archive_key, deadletter_key, raw_payload_key};
use crate::storage::{BucketResolver, ObjectRef};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Timestamp layout of inspected payloads.
const PAYLOAD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

const UNKNOWN_GATEWAY: &str = "unknown_gateway";
const UNKNOWN_DEVICE: &str = "unknown_device";

/// Topic notification wrapping the payload as a JSON string.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Extract and decode the payload of a queued topic notification.
pub fn unwrap_envelope(message: &QueueMessage) -> Result<Value> {
    let body = message.require_body()?;
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| Error::InvalidMessage(format!("body is not a notification: {}", e)))?;
    let payload = envelope
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::InvalidMessage("no payload found".to_string()))?;
    serde_json::from_str(&payload)
        .map_err(|e| Error::InvalidPayload(format!("payload is not JSON: {}", e)))
}

fn field<'a>(payload: &'a Value, name: &str) -> Option<&'a Value> {
    payload.get(name).filter(|v| !v.is_null())
}

/// Field that is set to a non-empty value.
fn present<'a>(payload: &'a Value, name: &str) -> Option<&'a Value> {
    field(payload, name).filter(|v| is_present(v))
}

fn required<'a>(payload: &'a Value, name: &str) -> Result<&'a Value> {
    present(payload, name)
        .ok_or_else(|| Error::InvalidPayload(format!("malformed payload: {} key missing", name)))
}

/// Archive key of a payload that must be fully described.
///
/// Requires `timestamp`, `gateway`, `deviceName`, `epoch_ms` and non-empty
/// `values`; the date comes from `timestamp` in its own offset.
pub fn inspected_key(payload: &Value) -> Result<String> {
    let timestamp = required(payload, "timestamp")?;
    let gateway = required(payload, "gateway")?;
    let device = required(payload, "deviceName")?;
    let epoch = required(payload, "epoch_ms")?;
    if !field(payload, "values").is_some_and(is_present) {
        return Err(Error::InvalidPayload("empty payload found".to_string()));
    }

    let raw = value_text(timestamp);
    let stamp = DateTime::parse_from_str(&raw, PAYLOAD_TIME_FORMAT).map_err(|e| {
        Error::InvalidPayload(format!("timestamp '{}' is not {}: {}", raw, PAYLOAD_TIME_FORMAT, e))
    })?;

    Ok(archive_key(
        stamp.date_naive(),
        &value_text(gateway),
        &value_text(device),
        &value_text(epoch),
    ))
}

/// Archive key of a payload taken as is, filling gaps with defaults.
///
/// `epoch_ms` defaults to `now_millis`; the gateway falls back to
/// `device_name`, the device to `site_name`. Null and empty values count
/// as missing.
pub fn lenient_key(payload: &Value, now_millis: i64) -> Result<String> {
    let epoch = match present(payload, "epoch_ms") {
        Some(value) => epoch_millis(value)?,
        None => now_millis,
    };
    let gateway = present(payload, "gateway")
        .or_else(|| present(payload, "device_name"))
        .map(value_text)
        .unwrap_or_else(|| UNKNOWN_GATEWAY.to_string());
    let device = present(payload, "deviceName")
        .or_else(|| present(payload, "site_name"))
        .map(value_text)
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());

    let date = epoch_date(epoch)
        .ok_or_else(|| Error::InvalidPayload(format!("epoch_ms {} is out of range", epoch)))?;
    Ok(archive_key(date, &gateway, &device, &epoch.to_string()))
}

/// Epoch milliseconds from a JSON number or numeric string.
pub(crate) fn epoch_millis(value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::InvalidPayload(format!("epoch_ms '{}' is not an integer", value)))
}

/// Stores each queued payload under a date/gateway/device key.
pub struct PayloadArchiver {
    buckets: Arc<dyn BucketResolver>,
    bucket: String,
    inspect: bool,
    clock: Arc<dyn Clock>,
}

impl PayloadArchiver {
    pub fn new(
        buckets: Arc<dyn BucketResolver>,
        bucket: impl Into<String>,
        inspect: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            buckets,
            bucket: bucket.into(),
            inspect,
            clock,
        }
    }

    fn key_for(&self, payload: &Value) -> Result<String> {
        if self.inspect {
            inspected_key(payload)
        } else {
            lenient_key(payload, self.clock.now_millis())
        }
    }
}

#[async_trait]
impl MessageHandler for PayloadArchiver {
    fn name(&self) -> &'static str {
        "sqs-to-s3"
    }

    async fn handle(&self, message: &QueueMessage) -> Result<()> {
        let payload = unwrap_envelope(message)?;
        debug!(message_id = %message.id, payload = %payload, "Payload received");
        let key = self.key_for(&payload)?;
        let object = ObjectRef::new(self.bucket.clone(), key);
        self.buckets
            .put(&object, serde_json::to_vec(&payload)?)
            .await?;
        telemetry::record_object_stored(self.name());
        debug!(object = %object, "Object stored");
        Ok(())
    }
}

/// Stores each queued payload under a nanosecond timestamp key.
pub struct RawPayloadArchiver {
    buckets: Arc<dyn BucketResolver>,
    bucket: String,
    clock: Arc<dyn Clock>,
}

impl RawPayloadArchiver {
    pub fn new(
        buckets: Arc<dyn BucketResolver>,
        bucket: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            buckets,
            bucket: bucket.into(),
            clock,
        }
    }
}

#[async_trait]
impl MessageHandler for RawPayloadArchiver {
    fn name(&self) -> &'static str {
        "sqs-dump-to-s3"
    }

    async fn handle(&self, message: &QueueMessage) -> Result<()> {
        let payload = unwrap_envelope(message)?;
        let object = ObjectRef::new(
            self.bucket.clone(),
            raw_payload_key(self.clock.now_nanos()),
        );
        self.buckets
            .put(&object, serde_json::to_vec(&payload)?)
            .await?;
        telemetry::record_object_stored(self.name());
        debug!(object = %object, "Object stored");
        Ok(())
    }
}

/// Stores whole triggering events, unprocessed.
pub struct DeadLetterArchiver {
    buckets: Arc<dyn BucketResolver>,
    bucket: String,
    clock: Arc<dyn Clock>,
}

impl DeadLetterArchiver {
    pub fn new(
        buckets: Arc<dyn BucketResolver>,
        bucket: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            buckets,
            bucket: bucket.into(),
            clock,
        }
    }

    /// Store `event` and return the key it was written to.
    pub async fn archive(&self, event: &Value) -> Result<String> {
        let key = deadletter_key(self.clock.now_nanos());
        let object = ObjectRef::new(self.bucket.clone(), key.clone());
        self.buckets.put(&object, serde_json::to_vec(event)?).await?;
        telemetry::record_object_stored("deadletter-to-s3");
        info!(object = %object, "Dead-lettered event stored");
        Ok(key)
    }
}

/// Calendar date (UTC) of epoch milliseconds.
pub fn epoch_date(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|t| t.date_naive())
}
