//! Amazon SQS and SNS adapters

use super::{OutboundMessage, Queue, Topic};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_sns as sns;
use aws_sdk_sqs as sqs;
use tracing::debug;

/// SQS queue addressed by URL.
pub struct SqsQueue {
    client: sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(config: &aws_config::SdkConfig, queue_url: impl Into<String>) -> Self {
        Self {
            client: sqs::Client::new(config),
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl Queue for SqsQueue {
    async fn send(&self, message: OutboundMessage) -> Result<String> {
        let mut request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message.body)
            .delay_seconds(0);

        for (name, value) in message.attributes {
            let attribute = sqs::types::MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .map_err(|e| Error::Queue(format!("invalid attribute '{}': {}", name, e)))?;
            request = request.message_attributes(name, attribute);
        }

        let output = request
            .send()
            .await
            .map_err(|e| Error::Queue(sqs::error::DisplayErrorContext(&e).to_string()))?;
        let id = output.message_id().unwrap_or_default().to_string();
        debug!(queue_url = %self.queue_url, message_id = %id, "Message sent");
        Ok(id)
    }
}

/// SNS topic addressed by ARN.
pub struct SnsTopic {
    client: sns::Client,
    topic_arn: String,
}

impl SnsTopic {
    pub fn new(config: &aws_config::SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self {
            client: sns::Client::new(config),
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl Topic for SnsTopic {
    async fn publish(&self, message: String) -> Result<String> {
        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::Topic(sns::error::DisplayErrorContext(&e).to_string()))?;
        let id = output.message_id().unwrap_or_default().to_string();
        debug!(topic_arn = %self.topic_arn, message_id = %id, "Message published");
        Ok(id)
    }
}
