//! tsrelay Day Filter Producer Binary
//!
//! Queues one export request per day between START_DAY and END_DAY.

use tsrelay::config::{flag_arg, log_level, require, ComponentFactory};
use tsrelay::export::DayFilter;
use tsrelay::messaging::SqsQueue;
use tsrelay::relay::DayFilterProducer;
use tsrelay::telemetry::Telemetry;

use clap::Parser;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// tsrelay Day Filter Producer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// First day to export (YYYY-MM-DD)
    #[arg(long, env = "START_DAY")]
    start_day: Option<String>,

    /// Last day to export, included (YYYY-MM-DD)
    #[arg(long, env = "END_DAY")]
    end_day: Option<String>,

    /// Export request queue URL
    #[arg(long, env = "SQS_URL")]
    queue_url: Option<String>,

    /// Verbose logging
    #[arg(long, env = "TRACE", value_parser = flag_arg, action = clap::ArgAction::Set, default_value = "false")]
    trace: bool,
}

fn parse_day(name: &str, value: Option<String>) -> tsrelay::Result<DayFilter> {
    require(name, value)?
        .parse()
        .map_err(|e| tsrelay::Error::Config(format!("{}: {}", name, e)))
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let args = Args::parse();

    let _telemetry =
        Telemetry::init_for_component("tsrelay-write-day-filters", log_level(args.trace))?;

    let start = parse_day("START_DAY", args.start_day)?;
    let end = parse_day("END_DAY", args.end_day)?;
    // Reject a reversed range before serving any invocation.
    DayFilter::range(start, end)?;
    let queue_url = require("SQS_URL", args.queue_url)?;

    let aws = ComponentFactory::load_aws_config().await;
    let producer = DayFilterProducer::new(Arc::new(SqsQueue::new(&aws, queue_url)));

    info!(start = %start, end = %end, "Day filter producer ready");

    let producer = &producer;
    run(service_fn(move |_event: LambdaEvent<Value>| async move {
        let sent = producer.produce(start, end).await?;
        Ok::<_, LambdaError>(sent)
    }))
    .await
}
