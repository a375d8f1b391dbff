//! tsrelay SQS Raw Dump Binary
//!
//! Stores queued payloads as received under `<unix nanos>.json`.

use tsrelay::clock::BoundedClock;
use tsrelay::config::{flag_arg, log_level, require, ComponentFactory};
use tsrelay::lambda::{batch_response, queue_messages};
use tsrelay::relay::{MessageHandler, RawPayloadArchiver};
use tsrelay::telemetry::Telemetry;

use aws_lambda_events::event::sqs::{SqsBatchResponse, SqsEvent};
use clap::Parser;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use std::sync::Arc;
use tracing::info;

/// tsrelay SQS Raw Dump
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination bucket
    #[arg(long, env = "BUCKET_NAME")]
    bucket: Option<String>,

    /// Verbose logging
    #[arg(long, env = "TRACE", value_parser = flag_arg, action = clap::ArgAction::Set, default_value = "false")]
    trace: bool,
}

async fn handle(
    archiver: &RawPayloadArchiver,
    event: LambdaEvent<SqsEvent>,
) -> Result<SqsBatchResponse, LambdaError> {
    let messages = queue_messages(event.payload);
    let failures = archiver.handle_batch(&messages).await?;
    Ok(batch_response(failures))
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let args = Args::parse();

    let _telemetry =
        Telemetry::init_for_component("tsrelay-sqs-dump-to-s3", log_level(args.trace))?;

    let bucket = require("BUCKET_NAME", args.bucket)?;
    let archiver = RawPayloadArchiver::new(
        ComponentFactory::create_bucket_resolver()?,
        bucket.clone(),
        Arc::new(BoundedClock::new()),
    );

    info!(bucket = %bucket, "Raw dump relay ready");

    let archiver = &archiver;
    run(service_fn(move |event| async move { handle(archiver, event).await })).await
}
