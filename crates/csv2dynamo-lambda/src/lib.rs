// AWS Lambda runtime adapter
//
// Receives S3 "object created" notifications, downloads each CSV object,
// and upserts its rows into the configured DynamoDB table.
//
// The lambda_runtime crate provides the tokio runtime; the handler itself
// processes records strictly one after another.

use csv2dynamo_config::LoaderConfig;
use csv2dynamo_core::LoaderResponse;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;

mod batch;
mod fetcher;
mod init;
mod loader;
mod sink;

pub use batch::plan_batches;
pub use fetcher::{ObjectFetcher, S3Fetcher};
pub use init::init_tracing;
pub use loader::Loader;
pub use sink::{BatchWriteBackend, DynamoSink, RecordSink};

/// Lambda handler for one trigger payload
async fn handle_event<F, S>(
    event: LambdaEvent<Value>,
    loader: &Loader<F, S>,
) -> Result<LoaderResponse, Error>
where
    F: ObjectFetcher,
    S: RecordSink,
{
    let (payload, context) = event.into_parts();
    tracing::debug!(request_id = %context.request_id, "Invocation received");

    loader.handle(&payload).await.map_err(|err| {
        tracing::error!(code = %err.code(), request_id = %context.request_id, "{}", err);
        Error::from(err)
    })
}

/// Lambda runtime entry point
pub async fn run() -> Result<(), Error> {
    let config = LoaderConfig::load()
        .map_err(|e| Error::from(format!("Failed to load configuration: {:#}", e)))?;

    init_tracing(&config.filter_directive(), config.log_format);
    tracing::info!(
        table = %config.table_name,
        batch_size = config.batch_size,
        scratch_dir = %config.scratch_dir.display(),
        "Lambda runtime starting"
    );

    // Credentials come from the function's execution role
    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let fetcher = S3Fetcher::new(aws_sdk_s3::Client::new(&aws));
    let sink = DynamoSink::from_config(aws_sdk_dynamodb::Client::new(&aws), &config);
    let loader = Arc::new(Loader::from_config(fetcher, sink, &config));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let loader = loader.clone();
        async move { handle_event(event, &loader).await }
    }))
    .await
}
