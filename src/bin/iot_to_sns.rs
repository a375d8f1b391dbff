//! tsrelay IoT to SNS Binary
//!
//! Validates gateway payloads and publishes them to a topic; rejected
//! payloads go to the dead-letter bucket.

use tsrelay::clock::BoundedClock;
use tsrelay::config::{flag_arg, log_level, require, ComponentFactory};
use tsrelay::messaging::SnsTopic;
use tsrelay::relay::{ForwardOutcome, IotForwarder};
use tsrelay::telemetry::Telemetry;

use clap::Parser;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// tsrelay IoT to SNS
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination topic ARN
    #[arg(long, env = "SNS_TOPIC_ARN")]
    topic_arn: Option<String>,

    /// Bucket receiving payloads that could not be forwarded
    #[arg(long, env = "DEAD_LETTER_S3_BUCKET")]
    dead_letter_bucket: Option<String>,

    /// Name used in dead-letter keys
    #[arg(long, env = "AWS_LAMBDA_FUNCTION_NAME", default_value = "iot-to-sns")]
    function_name: String,

    /// Verbose logging
    #[arg(long, env = "TRACE", value_parser = flag_arg, action = clap::ArgAction::Set, default_value = "false")]
    trace: bool,
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("tsrelay-iot-to-sns", log_level(args.trace))?;

    let topic_arn = require("SNS_TOPIC_ARN", args.topic_arn)?;
    let dead_letter_bucket = require("DEAD_LETTER_S3_BUCKET", args.dead_letter_bucket)?;

    let aws = ComponentFactory::load_aws_config().await;
    let forwarder = IotForwarder::new(
        Arc::new(SnsTopic::new(&aws, topic_arn.clone())),
        ComponentFactory::create_bucket_resolver()?,
        dead_letter_bucket,
        args.function_name,
        Arc::new(BoundedClock::new()),
    );

    info!(topic_arn = %topic_arn, "IoT forwarder ready");

    let forwarder = &forwarder;
    run(service_fn(move |event: LambdaEvent<Value>| async move {
        match forwarder.forward(&event.payload).await? {
            ForwardOutcome::Published { message_id } => {
                info!(message_id = %message_id, "Payload forwarded")
            }
            ForwardOutcome::DeadLettered { key } => info!(key = %key, "Payload dead-lettered"),
        }
        Ok::<_, LambdaError>(())
    }))
    .await
}
