//! Queue and topic interfaces
//!
//! Inbound queue batches are modelled by [`QueueMessage`]; handlers report
//! the messages they could not process through [`BatchFailures`] so only
//! those are redelivered.

pub mod aws;
pub mod memory;

pub use aws::{SnsTopic, SqsQueue};
pub use memory::{InMemoryQueue, InMemoryTopic};

use crate::storage::ObjectRef;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Message attribute carrying the bucket of an object reference.
pub const ATTR_BUCKET: &str = "bucket";
/// Message attribute carrying the key of an object reference.
pub const ATTR_KEY: &str = "key";
/// Body sent alongside attribute-only messages.
pub const ATTRIBUTES_ONLY_BODY: &str = "See messageAttributes";

/// One message of an inbound queue batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub body: Option<String>,
    /// String-valued message attributes
    pub attributes: BTreeMap<String, String>,
}

impl QueueMessage {
    pub fn with_body(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: Some(body.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// Non-empty body, or an error naming the message.
    pub fn require_body(&self) -> Result<&str> {
        match self.body.as_deref() {
            Some(body) if !body.trim().is_empty() => Ok(body),
            _ => Err(Error::InvalidMessage(format!(
                "message {} has no body",
                self.id
            ))),
        }
    }

    /// Object reference carried in the `bucket`/`key` attributes.
    pub fn object_ref(&self) -> Result<ObjectRef> {
        let bucket = self.attributes.get(ATTR_BUCKET).filter(|b| !b.is_empty());
        let key = self.attributes.get(ATTR_KEY).filter(|k| !k.is_empty());
        match (bucket, key) {
            (Some(bucket), Some(key)) => Ok(ObjectRef::new(bucket.clone(), key.clone())),
            (bucket, key) => Err(Error::InvalidMessage(format!(
                "bucket or key missing in message attributes: bucket={:?}, key={:?}",
                bucket, key
            ))),
        }
    }
}

/// A message to enqueue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

impl OutboundMessage {
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attribute-only message pointing at one object.
    pub fn object_ref(object: &ObjectRef) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_BUCKET.to_string(), object.bucket.clone());
        attributes.insert(ATTR_KEY.to_string(), object.key.clone());
        Self {
            body: ATTRIBUTES_ONLY_BODY.to_string(),
            attributes,
        }
    }
}

/// Identifiers of inbound messages left unprocessed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchFailures {
    pub message_ids: Vec<String>,
}

impl BatchFailures {
    pub fn push(&mut self, id: impl Into<String>) {
        self.message_ids.push(id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.message_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.message_ids.len()
    }
}

/// A queue messages can be sent to.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Send one message; returns the id assigned by the queue.
    async fn send(&self, message: OutboundMessage) -> Result<String>;
}

/// A publish/subscribe topic.
#[async_trait]
pub trait Topic: Send + Sync {
    /// Publish one message; returns the id assigned by the topic.
    async fn publish(&self, message: String) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_from_attributes() {
        let mut message = QueueMessage::default();
        message.id = "m-1".into();
        message.attributes.insert("bucket".into(), "dumps".into());
        assert!(matches!(message.object_ref(), Err(Error::InvalidMessage(_))));

        message.attributes.insert("key".into(), "a.json".into());
        assert_eq!(message.object_ref().unwrap(), ObjectRef::new("dumps", "a.json"));
    }

    #[test]
    fn test_require_body() {
        assert!(QueueMessage::with_body("1", "  ").require_body().is_err());
        assert_eq!(QueueMessage::with_body("1", "{}").require_body().unwrap(), "{}");
    }

    #[test]
    fn test_outbound_object_ref_shape() {
        let message = OutboundMessage::object_ref(&ObjectRef::new("b", "k.json"));
        assert_eq!(message.body, ATTRIBUTES_ONLY_BODY);
        assert_eq!(message.attributes["bucket"], "b");
        assert_eq!(message.attributes["key"], "k.json");
    }
}
