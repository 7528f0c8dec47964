// Record persistence
//
// Writes are plain upserts. Batching only reduces round trips; a failed
// batch does not roll back batches that were already accepted.

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemOutput;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use csv2dynamo_config::LoaderConfig;
use csv2dynamo_core::{LoaderError, Record, Result};
use std::collections::HashMap;
use std::time::Duration;

use crate::batch::plan_batches;

/// Destination for parsed records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Upsert every record into `table`, returning how many items were sent.
    async fn put_all(&self, table: &str, records: Vec<Record>) -> Result<usize>;
}

/// The one DynamoDB call the sink makes.
///
/// Kept as close to `aws_sdk_dynamodb::Client` as possible so that only the
/// request plumbing is left untested when a fake stands in for it.
#[async_trait]
pub trait BatchWriteBackend: Send + Sync {
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteItemOutput>;
}

#[async_trait]
impl BatchWriteBackend for aws_sdk_dynamodb::Client {
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteItemOutput> {
        self.batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(|e| LoaderError::write(table, DisplayErrorContext(&e)))
    }
}

/// Writes records with DynamoDB BatchWriteItem.
#[derive(Clone)]
pub struct DynamoSink<B = aws_sdk_dynamodb::Client> {
    backend: B,
    partition_key: Option<String>,
    batch_size: usize,
    max_unprocessed_retries: u32,
}

impl<B: BatchWriteBackend> DynamoSink<B> {
    pub fn from_config(backend: B, config: &LoaderConfig) -> Self {
        Self {
            backend,
            partition_key: config.partition_key_name.clone(),
            batch_size: config.batch_size,
            max_unprocessed_retries: config.max_unprocessed_retries,
        }
    }

    /// Send one batch, resubmitting whatever DynamoDB reports as unprocessed.
    async fn write_batch(&self, table: &str, mut requests: Vec<WriteRequest>) -> Result<()> {
        let mut attempt = 0u32;

        loop {
            let output = self.backend.batch_write(table, requests).await?;

            let unprocessed = output
                .unprocessed_items
                .and_then(|mut items| items.remove(table))
                .unwrap_or_default();
            if unprocessed.is_empty() {
                return Ok(());
            }

            attempt += 1;
            if attempt > self.max_unprocessed_retries {
                return Err(LoaderError::write(
                    table,
                    format!(
                        "{} items still unprocessed after {} resubmissions",
                        unprocessed.len(),
                        self.max_unprocessed_retries
                    ),
                ));
            }

            tracing::warn!(
                table,
                unprocessed = unprocessed.len(),
                attempt,
                "Resubmitting unprocessed items"
            );
            tokio::time::sleep(unprocessed_backoff(attempt)).await;
            requests = unprocessed;
        }
    }
}

#[async_trait]
impl<B: BatchWriteBackend> RecordSink for DynamoSink<B> {
    async fn put_all(&self, table: &str, records: Vec<Record>) -> Result<usize> {
        tracing::info!("Writing to DynamoDB table: {}", table);

        let mut written = 0usize;
        for batch in plan_batches(records, self.batch_size, self.partition_key.as_deref()) {
            let requests = batch
                .into_iter()
                .map(to_write_request)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| LoaderError::write(table, e))?;
            let count = requests.len();

            self.write_batch(table, requests).await?;
            written += count;
        }

        tracing::info!(items = written, "CSV file was successfully written to DynamoDB.");
        Ok(written)
    }
}

fn to_write_request(
    record: Record,
) -> std::result::Result<WriteRequest, aws_sdk_dynamodb::error::BuildError> {
    let item: HashMap<String, AttributeValue> = record
        .into_iter()
        .map(|(field, value)| (field, AttributeValue::S(value)))
        .collect();
    let put = PutRequest::builder().set_item(Some(item)).build()?;
    Ok(WriteRequest::builder().put_request(put).build())
}

fn unprocessed_backoff(attempt: u32) -> Duration {
    Duration::from_millis(50 * 2u64.pow(attempt.min(6)))
}
