//! Export telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct ExportInstruments {
    runs: Counter<u64>,
    run_duration_seconds: Histogram<f64>,
    pages: Counter<u64>,
    rows: Counter<u64>,
    documents: Counter<u64>,
    document_bytes: Histogram<u64>,
    column_mismatches: Counter<u64>,
}

fn instruments() -> &'static ExportInstruments {
    static INSTRUMENTS: OnceLock<ExportInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("tsrelay.export");
        ExportInstruments {
            runs: meter
                .u64_counter("tsrelay.export.runs")
                .with_description("Export runs by outcome")
                .init(),
            run_duration_seconds: meter
                .f64_histogram("tsrelay.export.duration")
                .with_description("Export run duration")
                .with_unit("s")
                .init(),
            pages: meter
                .u64_counter("tsrelay.export.pages")
                .with_description("Query pages read from the source")
                .init(),
            rows: meter
                .u64_counter("tsrelay.export.rows")
                .with_description("Rows read from the source")
                .init(),
            documents: meter
                .u64_counter("tsrelay.export.documents")
                .with_description("Dump documents written")
                .init(),
            document_bytes: meter
                .u64_histogram("tsrelay.export.document.size")
                .with_description("Serialized dump document size")
                .with_unit("By")
                .init(),
            column_mismatches: meter
                .u64_counter("tsrelay.export.column_mismatches")
                .with_description("Pages whose column layout differs from their chunk's first page")
                .init(),
        }
    })
}

pub fn record_page(rows: u64) {
    let i = instruments();
    i.pages.add(1, &[]);
    i.rows.add(rows, &[]);
}

pub fn record_document(bytes: u64) {
    let i = instruments();
    i.documents.add(1, &[]);
    i.document_bytes.record(bytes, &[]);
}

pub fn record_column_mismatches(count: u64) {
    if count > 0 {
        instruments().column_mismatches.add(count, &[]);
    }
}

pub fn record_run(outcome: &'static str, duration_seconds: f64) {
    let i = instruments();
    i.runs.add(1, &[KeyValue::new("outcome", outcome)]);
    i.run_duration_seconds.record(duration_seconds, &[]);
}
