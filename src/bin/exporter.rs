//! tsrelay Exporter Binary
//!
//! Dumps a Timestream table to S3 as chunked JSON documents. Runs as a
//! Lambda fed by queued day requests, or once from the command line.

use tsrelay::clock::BoundedClock;
use tsrelay::config::{block_size_arg, flag_arg, log_level, require, BlockSize, ComponentFactory};
use tsrelay::export::{DayFilter, ExportConfig, Exporter};
use tsrelay::lambda::{batch_response, queue_messages};
use tsrelay::telemetry::Telemetry;
use tsrelay::timeseries::{TableRef, TimestreamSource};

use aws_lambda_events::event::sqs::{SqsBatchResponse, SqsEvent};
use clap::{Parser, ValueEnum};
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Serve queued `{"filter":"YYYY-MM-DD"}` requests
    Lambda,
    /// Export once and exit
    Once,
}

/// tsrelay Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination bucket for dump documents
    #[arg(long, env = "BUCKET")]
    bucket: Option<String>,

    /// Query pages per dump document
    #[arg(long, env = "BLOCKSIZE", value_parser = block_size_arg)]
    block_size: Option<BlockSize>,

    /// Source database
    #[arg(long, env = "DBNAME")]
    database: Option<String>,

    /// Source table
    #[arg(long, env = "DBTABLE")]
    table: Option<String>,

    /// Verbose logging
    #[arg(long, env = "TRACE", value_parser = flag_arg, action = clap::ArgAction::Set, default_value = "false")]
    trace: bool,

    /// Execution mode
    #[arg(long, value_enum, default_value_t = Mode::Lambda)]
    mode: Mode,

    /// Day to export in `once` mode (YYYY-MM-DD); the whole table when omitted
    #[arg(long)]
    day: Option<DayFilter>,
}

async fn handle(
    exporter: &Exporter,
    event: LambdaEvent<SqsEvent>,
) -> Result<SqsBatchResponse, LambdaError> {
    let messages = queue_messages(event.payload);
    let failures = exporter.export_messages(&messages).await?;
    Ok(batch_response(failures))
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("tsrelay-exporter", log_level(args.trace))?;

    let source = TableRef::new(
        require("DBNAME", args.database)?,
        require("DBTABLE", args.table)?,
    )?;
    let block_size = args
        .block_size
        .ok_or_else(|| tsrelay::Error::Config("Environment variable BLOCKSIZE missing".into()))?;
    let config = ExportConfig::new(source, require("BUCKET", args.bucket)?, block_size)?;

    let aws = ComponentFactory::load_aws_config().await;
    let exporter = Exporter::new(
        config,
        Arc::new(TimestreamSource::connect(&aws).await?),
        ComponentFactory::create_bucket_resolver()?,
        Arc::new(BoundedClock::new()),
    );

    info!(
        source = %exporter.config().source,
        bucket = %exporter.config().bucket,
        block_size = exporter.config().block_size.get(),
        mode = ?args.mode,
        "Exporter ready"
    );

    match args.mode {
        Mode::Once => {
            let report = exporter.export(args.day.as_ref()).await?;
            info!(documents = report.documents, rows = report.rows, "Export complete");
            Ok(())
        }
        Mode::Lambda => {
            let exporter = &exporter;
            run(service_fn(move |event| async move { handle(exporter, event).await })).await
        }
    }
}
