//! In-memory queue and topic for development and testing

use super::{OutboundMessage, Queue, Topic};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Queue that records every sent message.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    sent: Mutex<Vec<OutboundMessage>>,
    fail_on: Mutex<Option<usize>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the send with the given zero-based sequence number.
    pub fn failing_send(self, send: usize) -> Self {
        *self.fail_on.lock() = Some(send);
        self
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn send(&self, message: OutboundMessage) -> Result<String> {
        let mut sent = self.sent.lock();
        let sequence = sent.len();
        if *self.fail_on.lock() == Some(sequence) {
            return Err(Error::Queue(format!("injected failure on send {}", sequence)));
        }
        sent.push(message);
        Ok(format!("msg-{}", sequence))
    }
}

/// Topic that records every published message.
#[derive(Debug, Default)]
pub struct InMemoryTopic {
    published: Mutex<Vec<String>>,
    unavailable: bool,
}

impl InMemoryTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Topic whose every publish fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Topic for InMemoryTopic {
    async fn publish(&self, message: String) -> Result<String> {
        if self.unavailable {
            return Err(Error::Topic("topic unavailable".to_string()));
        }
        let mut published = self.published.lock();
        published.push(message);
        Ok(format!("pub-{}", published.len()))
    }
}
