//! # tsrelay
//!
//! Event-triggered relays moving device telemetry between queues, object
//! storage, topics and a time-series database, plus a chunked export and
//! import path for whole time-series tables.
//!
//! ## Pipelines
//!
//! - **Export**: query a table (optionally one day of it) page by page and
//!   store the pages as numbered JSON dump documents
//! - **Import**: replay dump documents into an existing table, 100 records
//!   per write
//! - **Relays**: day-request production, dump-list fan-out, payload
//!   archiving, dead-lettering, device payload forwarding and ingestion
//!
//! ## Seams
//!
//! Every external service sits behind a trait ([`timeseries::TimeSeriesSource`],
//! [`timeseries::TimeSeriesSink`], [`storage::BucketResolver`],
//! [`messaging::Queue`], [`messaging::Topic`], [`clock::Clock`]) with an AWS
//! implementation and an in-memory one.

pub mod clock;
pub mod config;
pub mod export;
pub mod import;
pub mod lambda;
pub mod messaging;
pub mod relay;
pub mod schema;
pub mod storage;
pub mod telemetry;
pub mod timeseries;

mod error;

pub use error::{Error, Result};

/// Common imports for wiring the pipelines together
pub mod prelude {
    pub use crate::clock::{BoundedClock, Clock, ManualClock};
    pub use crate::config::{BlockSize, ComponentFactory};
    pub use crate::export::{DayFilter, ExportConfig, ExportReport, Exporter};
    pub use crate::import::{ImportConfig, ImportReport, Importer};
    pub use crate::messaging::{
        BatchFailures, InMemoryQueue, InMemoryTopic, OutboundMessage, Queue, QueueMessage, Topic,
    };
    pub use crate::relay::MessageHandler;
    pub use crate::schema::{DumpDocument, QueryPage, WriteRecord};
    pub use crate::storage::{BucketResolver, MemoryBuckets, ObjectRef};
    pub use crate::timeseries::{
        InMemorySink, InMemorySource, TableRef, TimeSeriesSink, TimeSeriesSource,
    };
    pub use crate::{Error, Result};
}
