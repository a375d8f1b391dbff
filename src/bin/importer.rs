//! tsrelay Importer Binary
//!
//! Loads dump documents referenced by queued `bucket`/`key` attributes into
//! an existing Timestream table.

use tsrelay::config::{flag_arg, log_level, require, ComponentFactory};
use tsrelay::import::{ImportConfig, Importer};
use tsrelay::lambda::queue_messages;
use tsrelay::telemetry::Telemetry;
use tsrelay::timeseries::{TableRef, TimestreamSink};

use aws_lambda_events::event::sqs::SqsEvent;
use clap::Parser;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use std::sync::Arc;
use tracing::{info, warn};

/// tsrelay Importer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination database
    #[arg(long, env = "DBNAME")]
    database: Option<String>,

    /// Destination table
    #[arg(long, env = "DBTABLE")]
    table: Option<String>,

    /// Verbose logging
    #[arg(long, env = "TRACE", value_parser = flag_arg, action = clap::ArgAction::Set, default_value = "false")]
    trace: bool,
}

async fn handle(importer: &Importer, event: LambdaEvent<SqsEvent>) -> Result<(), LambdaError> {
    let messages = queue_messages(event.payload);
    let batch = importer.import_messages(&messages).await?;
    if !batch.failed.is_empty() {
        // Failed references are not redelivered.
        warn!(failed = batch.failed.len(), "Some documents were not imported");
    }
    info!(
        rows_read = batch.report.rows_read,
        records_written = batch.report.records_written,
        rows_skipped = batch.report.rows_skipped,
        records_rejected = batch.report.records_rejected,
        "Batch imported"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("tsrelay-importer", log_level(args.trace))?;

    let destination = TableRef::new(
        require("DBNAME", args.database)?,
        require("DBTABLE", args.table)?,
    )?;

    let aws = ComponentFactory::load_aws_config().await;
    let importer = Importer::new(
        ImportConfig {
            destination: destination.clone(),
        },
        Arc::new(TimestreamSink::connect(&aws).await?),
        ComponentFactory::create_bucket_resolver()?,
    );

    info!(destination = %destination, "Importer ready");

    let importer = &importer;
    run(service_fn(move |event| async move { handle(importer, event).await })).await
}
