//! Export request producer.

use super::telemetry;
use crate::export::DayFilter;
use crate::messaging::{OutboundMessage, Queue};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

const FUNCTION: &str = "write-day-filters";

/// Enqueues one export request per day of an inclusive range.
pub struct DayFilterProducer {
    queue: Arc<dyn Queue>,
}

impl DayFilterProducer {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self { queue }
    }

    /// Send `{"filter":"YYYY-MM-DD"}` for every day from `start` to `end`.
    ///
    /// Stops at the first send failure; days already sent stay queued.
    pub async fn produce(&self, start: DayFilter, end: DayFilter) -> Result<usize> {
        let days = DayFilter::range(start, end)?;
        info!(start = %start, end = %end, days = days.len(), "Enqueuing export requests");

        for day in &days {
            let body = day.to_request_body()?;
            let message_id = self.queue.send(OutboundMessage::body(body)).await?;
            debug!(day = %day, message_id = %message_id, "Export request sent");
        }
        telemetry::record_published(FUNCTION, days.len() as u64);

        info!(sent = days.len(), "Finished without error");
        Ok(days.len())
    }
}
