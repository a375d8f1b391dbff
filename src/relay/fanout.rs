//! Dump-list fan-out: one import request per stored document.

use super::telemetry;
use crate::messaging::{OutboundMessage, Queue};
use crate::storage::keys::is_json_key;
use crate::storage::{BucketResolver, ObjectRef};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

const FUNCTION: &str = "publish-dump-list";

/// Counts of one fan-out run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub published: usize,
    /// Keys left out because they are not JSON documents
    pub skipped: usize,
}

/// Publishes every JSON document of a bucket as an attribute-only message.
pub struct DumpListPublisher {
    buckets: Arc<dyn BucketResolver>,
    queue: Arc<dyn Queue>,
}

impl DumpListPublisher {
    pub fn new(buckets: Arc<dyn BucketResolver>, queue: Arc<dyn Queue>) -> Self {
        Self { buckets, queue }
    }

    pub async fn publish(&self, bucket: &str) -> Result<FanoutReport> {
        let keys = self.buckets.list(bucket).await?;
        info!(bucket, keys = keys.len(), "Listing dump bucket");

        let mut report = FanoutReport::default();
        for key in keys {
            if !is_json_key(&key) {
                debug!(key = %key, "Skipping key");
                report.skipped += 1;
                continue;
            }
            let object = ObjectRef::new(bucket, key);
            let message_id = self.queue.send(OutboundMessage::object_ref(&object)).await?;
            debug!(object = %object, message_id = %message_id, "Publishing");
            report.published += 1;
        }
        telemetry::record_published(FUNCTION, report.published as u64);

        info!(
            published = report.published,
            skipped = report.skipped,
            "Dump list published"
        );
        Ok(report)
    }
}
