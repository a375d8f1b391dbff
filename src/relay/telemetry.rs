//! Relay telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct RelayInstruments {
    batch_size: Histogram<u64>,
    messages: Counter<u64>,
    objects_stored: Counter<u64>,
    published: Counter<u64>,
    dead_lettered: Counter<u64>,
}

fn instruments() -> &'static RelayInstruments {
    static INSTRUMENTS: OnceLock<RelayInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("tsrelay.relay");
        RelayInstruments {
            batch_size: meter
                .u64_histogram("tsrelay.relay.batch.size")
                .with_description("Messages per inbound queue batch")
                .init(),
            messages: meter
                .u64_counter("tsrelay.relay.messages")
                .with_description("Inbound messages handled by outcome")
                .init(),
            objects_stored: meter
                .u64_counter("tsrelay.relay.objects_stored")
                .with_description("Objects written by relays")
                .init(),
            published: meter
                .u64_counter("tsrelay.relay.published")
                .with_description("Messages sent to queues and topics")
                .init(),
            dead_lettered: meter
                .u64_counter("tsrelay.relay.dead_lettered")
                .with_description("Payloads diverted to the dead-letter bucket")
                .init(),
        }
    })
}

pub fn record_batch(function: &'static str, size: u64) {
    instruments()
        .batch_size
        .record(size, &[KeyValue::new("function", function)]);
}

pub fn record_message(function: &'static str, outcome: &'static str) {
    instruments().messages.add(
        1,
        &[
            KeyValue::new("function", function),
            KeyValue::new("outcome", outcome),
        ],
    );
}

pub fn record_object_stored(function: &'static str) {
    instruments()
        .objects_stored
        .add(1, &[KeyValue::new("function", function)]);
}

pub fn record_published(function: &'static str, count: u64) {
    instruments()
        .published
        .add(count, &[KeyValue::new("function", function)]);
}

pub fn record_dead_lettered(function: &'static str) {
    instruments()
        .dead_lettered
        .add(1, &[KeyValue::new("function", function)]);
}
