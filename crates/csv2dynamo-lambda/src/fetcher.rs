// Object download

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use csv2dynamo_core::{LoaderError, Result};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Source of the objects named in trigger payloads
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Download `bucket`/`key` into `dest`, returning the number of bytes written.
    async fn fetch_to(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64>;
}

/// Fetches objects with the S3 GetObject API, streaming the body to disk.
#[derive(Clone)]
pub struct S3Fetcher {
    client: aws_sdk_s3::Client,
}

impl S3Fetcher {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectFetcher for S3Fetcher {
    async fn fetch_to(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| LoaderError::fetch(bucket, key, DisplayErrorContext(&e)))?;

        let mut body = output.body;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| LoaderError::fetch(bucket, key, e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}
