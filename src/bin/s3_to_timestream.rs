//! tsrelay S3 to Timestream Binary
//!
//! Writes each newly stored device payload to a Timestream table.

use tsrelay::config::{flag_arg, log_level, require, ComponentFactory};
use tsrelay::lambda::first_object;
use tsrelay::relay::DeviceIngestor;
use tsrelay::telemetry::Telemetry;
use tsrelay::timeseries::{TableRef, TimestreamSink};

use aws_lambda_events::event::s3::S3Event;
use clap::Parser;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use std::sync::Arc;
use tracing::{error, info};

/// tsrelay S3 to Timestream
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination database
    #[arg(long, env = "DB_NAME")]
    database: Option<String>,

    /// Destination table
    #[arg(long, env = "TABLE_NAME")]
    table: Option<String>,

    /// Verbose logging
    #[arg(long, env = "TRACE", value_parser = flag_arg, action = clap::ArgAction::Set, default_value = "false")]
    trace: bool,
}

async fn handle(ingestor: &DeviceIngestor, event: LambdaEvent<S3Event>) -> Result<(), LambdaError> {
    let object = first_object(&event.payload)?;
    if let Err(e) = ingestor.ingest(&object).await {
        error!(object = %object, error = %e, "Error when pushing data to Timestream");
        return Err(e.into());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let args = Args::parse();

    let _telemetry =
        Telemetry::init_for_component("tsrelay-s3-to-timestream", log_level(args.trace))?;

    let table = TableRef::new(
        require("DB_NAME", args.database)?,
        require("TABLE_NAME", args.table)?,
    )?;

    let aws = ComponentFactory::load_aws_config().await;
    let ingestor = DeviceIngestor::new(
        ComponentFactory::create_bucket_resolver()?,
        Arc::new(TimestreamSink::connect(&aws).await?),
        table.clone(),
    );

    info!(table = %table, "Ingest relay ready");

    let ingestor = &ingestor;
    run(service_fn(move |event| async move { handle(ingestor, event).await })).await
}
