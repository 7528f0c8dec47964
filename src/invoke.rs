//! `csv2dynamo invoke`: handle a notification event from a file against
//! the real buckets and table, as the deployed function would.

use anyhow::{Context, Result};
use clap::Args;
use csv2dynamo_lambda::{DynamoSink, Loader, S3Fetcher};
use serde_json::Value;
use std::path::PathBuf;

use crate::clients::{loader_config, s3_client, sdk_config};

#[derive(Args)]
pub struct InvokeArgs {
    /// Notification event (JSON) to handle
    #[arg(short, long, value_name = "FILE")]
    pub event: PathBuf,

    /// Destination table (overrides TABLE_NAME)
    #[arg(short, long)]
    pub table: Option<String>,

    /// Partition key attribute, used to collapse duplicate keys within a batch
    #[arg(long)]
    pub partition_key: Option<String>,

    /// Endpoint for both S3 and DynamoDB, e.g. http://localhost:4566 for LocalStack
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
}

pub async fn run(args: InvokeArgs) -> Result<()> {
    let content = tokio::fs::read_to_string(&args.event)
        .await
        .with_context(|| format!("Failed to read event file: {}", args.event.display()))?;
    let payload: Value = serde_json::from_str(&content)
        .with_context(|| format!("Event file is not JSON: {}", args.event.display()))?;

    let config = loader_config(args.table, args.partition_key)?;
    let sdk = sdk_config(args.endpoint.as_deref()).await;
    let fetcher = S3Fetcher::new(s3_client(&sdk, args.endpoint.is_some()));
    let sink = DynamoSink::from_config(aws_sdk_dynamodb::Client::new(&sdk), &config);
    let loader = Loader::from_config(fetcher, sink, &config);

    let response = loader.handle(&payload).await.map_err(|err| {
        tracing::error!(code = %err.code(), "{}", err);
        anyhow::Error::from(err)
    })?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
