//! Import telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::Counter;
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct ImportInstruments {
    documents: Counter<u64>,
    rows: Counter<u64>,
    rows_skipped: Counter<u64>,
    records_written: Counter<u64>,
    records_rejected: Counter<u64>,
    write_calls: Counter<u64>,
}

fn instruments() -> &'static ImportInstruments {
    static INSTRUMENTS: OnceLock<ImportInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("tsrelay.import");
        ImportInstruments {
            documents: meter
                .u64_counter("tsrelay.import.documents")
                .with_description("Dump documents processed by outcome")
                .init(),
            rows: meter
                .u64_counter("tsrelay.import.rows")
                .with_description("Rows read from dump documents")
                .init(),
            rows_skipped: meter
                .u64_counter("tsrelay.import.rows_skipped")
                .with_description("Rows excluded because they could not be reshaped")
                .init(),
            records_written: meter
                .u64_counter("tsrelay.import.records")
                .with_description("Records accepted by the sink")
                .init(),
            records_rejected: meter
                .u64_counter("tsrelay.import.records_rejected")
                .with_description("Records rejected by the sink")
                .init(),
            write_calls: meter
                .u64_counter("tsrelay.import.write_calls")
                .with_description("Write calls issued to the sink")
                .init(),
        }
    })
}

pub fn record_document(outcome: &'static str, rows: u64, skipped: u64) {
    let i = instruments();
    i.documents.add(1, &[KeyValue::new("outcome", outcome)]);
    i.rows.add(rows, &[]);
    if skipped > 0 {
        i.rows_skipped.add(skipped, &[]);
    }
}

pub fn record_write(accepted: u64, rejected: u64) {
    let i = instruments();
    i.write_calls.add(1, &[]);
    i.records_written.add(accepted, &[]);
    if rejected > 0 {
        i.records_rejected.add(rejected, &[]);
    }
}
