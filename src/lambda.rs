//! Conversions between Lambda event payloads and the crate's message model.

use crate::messaging::{BatchFailures, QueueMessage};
use crate::storage::ObjectRef;
use crate::{Error, Result};
use aws_lambda_events::event::s3::S3Event;
use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent};
use std::collections::BTreeMap;

/// Queue messages of an SQS trigger, keeping string attributes only.
pub fn queue_messages(event: SqsEvent) -> Vec<QueueMessage> {
    event
        .records
        .into_iter()
        .map(|record| {
            let attributes: BTreeMap<String, String> = record
                .message_attributes
                .into_iter()
                .filter_map(|(name, attribute)| attribute.string_value.map(|value| (name, value)))
                .collect();
            QueueMessage {
                id: record.message_id.unwrap_or_default(),
                body: record.body,
                attributes,
            }
        })
        .collect()
}

/// Partial batch response naming the messages to redeliver.
pub fn batch_response(failures: BatchFailures) -> SqsBatchResponse {
    let mut response = SqsBatchResponse::default();
    response.batch_item_failures = failures
        .message_ids
        .into_iter()
        .map(|id| {
            let mut failure = BatchItemFailure::default();
            failure.item_identifier = id;
            failure
        })
        .collect();
    response
}

/// Decode an object key from a store notification: `+` is a space, the
/// rest is percent-encoded.
pub fn decode_object_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| Error::InvalidMessage(format!("object key '{}' is not UTF-8: {}", raw, e)))
}

/// Object named by the first record of a store notification.
pub fn first_object(event: &S3Event) -> Result<ObjectRef> {
    let record = event
        .records
        .first()
        .ok_or_else(|| Error::InvalidMessage("notification has no records".to_string()))?;
    let bucket = record
        .s3
        .bucket
        .name
        .as_deref()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| Error::InvalidMessage("notification has no bucket name".to_string()))?;
    let key = record
        .s3
        .object
        .key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::InvalidMessage("notification has no object key".to_string()))?;
    Ok(ObjectRef::new(bucket, decode_object_key(key)?))
}
