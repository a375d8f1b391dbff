//! tsrelay Dead-Letter Archive Binary
//!
//! Stores every triggering event, unprocessed, under `<unix nanos>`.

use tsrelay::clock::BoundedClock;
use tsrelay::config::{flag_arg, log_level, require, ComponentFactory};
use tsrelay::relay::DeadLetterArchiver;
use tsrelay::telemetry::Telemetry;

use clap::Parser;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// tsrelay Dead-Letter Archive
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dead-letter bucket
    #[arg(long, env = "DEADLETTER_BUCKET_NAME")]
    bucket: Option<String>,

    /// Verbose logging
    #[arg(long, env = "TRACE", value_parser = flag_arg, action = clap::ArgAction::Set, default_value = "false")]
    trace: bool,
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let args = Args::parse();

    let _telemetry =
        Telemetry::init_for_component("tsrelay-deadletter-to-s3", log_level(args.trace))?;

    let bucket = require("DEADLETTER_BUCKET_NAME", args.bucket)?;
    let archiver = DeadLetterArchiver::new(
        ComponentFactory::create_bucket_resolver()?,
        bucket.clone(),
        Arc::new(BoundedClock::new()),
    );

    info!(bucket = %bucket, "Dead-letter archive ready");

    let archiver = &archiver;
    run(service_fn(move |event: LambdaEvent<Value>| async move {
        archiver.archive(&event.payload).await?;
        Ok::<_, LambdaError>(())
    }))
    .await
}
