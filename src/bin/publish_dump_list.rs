//! tsrelay Dump List Publisher Binary
//!
//! Sends one import request per JSON document found in the dump bucket.

use tsrelay::config::{flag_arg, log_level, require, ComponentFactory};
use tsrelay::messaging::SqsQueue;
use tsrelay::relay::DumpListPublisher;
use tsrelay::telemetry::Telemetry;

use clap::Parser;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// tsrelay Dump List Publisher
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bucket holding the dump documents
    #[arg(long, env = "BUCKET_NAME")]
    bucket: Option<String>,

    /// Import request queue URL
    #[arg(long, env = "SQS_URL")]
    queue_url: Option<String>,

    /// Verbose logging
    #[arg(long, env = "TRACE", value_parser = flag_arg, action = clap::ArgAction::Set, default_value = "false")]
    trace: bool,
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let args = Args::parse();

    let _telemetry =
        Telemetry::init_for_component("tsrelay-publish-dump-list", log_level(args.trace))?;

    let bucket = require("BUCKET_NAME", args.bucket)?;
    let queue_url = require("SQS_URL", args.queue_url)?;

    let aws = ComponentFactory::load_aws_config().await;
    let publisher = DumpListPublisher::new(
        ComponentFactory::create_bucket_resolver()?,
        Arc::new(SqsQueue::new(&aws, queue_url)),
    );

    info!(bucket = %bucket, "Dump list publisher ready");

    let publisher = &publisher;
    let bucket = bucket.as_str();
    run(service_fn(move |_event: LambdaEvent<Value>| async move {
        let report = publisher.publish(bucket).await?;
        Ok::<_, LambdaError>(report.published)
    }))
    .await
}
