//! `csv2dynamo load`: push a CSV file from disk through the loader.
//!
//! The file is wrapped in a one-record notification and handed to the same
//! [`Loader`] the function runs, so key decoding, scratch handling, parsing
//! and batching behave exactly as they do on Lambda.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use csv2dynamo_config::LoaderConfig;
use csv2dynamo_core::{LoaderError, LoaderResponse, Record};
use csv2dynamo_lambda::{DynamoSink, Loader, ObjectFetcher, RecordSink};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::clients::{loader_config, sdk_config};

/// Bucket name used in the synthetic notification
pub const LOCAL_BUCKET: &str = "local";

#[derive(Args)]
pub struct LoadArgs {
    /// CSV file to load
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Destination table (overrides TABLE_NAME)
    #[arg(short, long)]
    pub table: Option<String>,

    /// Partition key attribute, used to collapse duplicate keys within a batch
    #[arg(long)]
    pub partition_key: Option<String>,

    /// DynamoDB endpoint, e.g. http://localhost:8000 for DynamoDB Local
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Print items as JSON lines instead of writing them
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: LoadArgs) -> Result<()> {
    let table = match (&args.table, args.dry_run) {
        (None, true) => Some("dry-run".to_string()),
        (table, _) => table.clone(),
    };
    let config = loader_config(table, args.partition_key.clone())?;

    let response = if args.dry_run {
        load_file(&args.file, &config, StdoutSink).await?
    } else {
        let sdk = sdk_config(args.endpoint.as_deref()).await;
        let sink = DynamoSink::from_config(aws_sdk_dynamodb::Client::new(&sdk), &config);
        load_file(&args.file, &config, sink).await?
    };

    info!(table = %config.table_name, "{}", response.body);
    Ok(())
}

/// Run the loader over one local file, writing into `sink`.
pub async fn load_file<S: RecordSink>(
    file: &Path,
    config: &LoaderConfig,
    sink: S,
) -> Result<LoaderResponse> {
    let name = file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Not a file path: {}", file.display()))?;
    if !file.is_file() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let loader = Loader::from_config(LocalFetcher::new(file), sink, config);
    let response = loader
        .handle(&local_notification(name))
        .await
        .with_context(|| format!("Failed to load {}", file.display()))?;
    Ok(response)
}

/// Notification payload naming one object in [`LOCAL_BUCKET`].
pub fn local_notification(key: &str) -> Value {
    json!({
        "Records": [{
            "eventSource": "csv2dynamo:local",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": { "name": LOCAL_BUCKET },
                "object": { "key": urlencoding::encode(key) }
            }
        }]
    })
}

/// Serves a single file on disk under any key.
pub struct LocalFetcher {
    path: PathBuf,
}

impl LocalFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ObjectFetcher for LocalFetcher {
    async fn fetch_to(&self, bucket: &str, key: &str, dest: &Path) -> csv2dynamo_core::Result<u64> {
        tokio::fs::copy(&self.path, dest)
            .await
            .map_err(|e| LoaderError::fetch(bucket, key, e))
    }
}

/// Prints every record as one JSON line.
pub struct StdoutSink;

#[async_trait]
impl RecordSink for StdoutSink {
    async fn put_all(&self, _table: &str, records: Vec<Record>) -> csv2dynamo_core::Result<usize> {
        for record in &records {
            println!("{}", json!(record));
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv2dynamo_config::Platform;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CollectingSink {
        records: Arc<Mutex<Vec<Record>>>,
    }

    #[async_trait]
    impl RecordSink for CollectingSink {
        async fn put_all(&self, _table: &str, records: Vec<Record>) -> csv2dynamo_core::Result<usize> {
            let count = records.len();
            self.records.lock().unwrap().extend(records);
            Ok(count)
        }
    }

    fn config(scratch: &Path) -> LoaderConfig {
        let mut config = LoaderConfig::from_platform_defaults(Platform::Local);
        config.table_name = "people".to_string();
        config.scratch_dir = scratch.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_local_file_goes_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("my people+list.csv");
        std::fs::write(&file, "id,name\n1,Alice\n2,Bob\n").unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let sink = CollectingSink::default();

        let response = load_file(&file, &config(scratch.path()), sink.clone())
            .await
            .unwrap();

        assert!(response.is_success());
        let records = sink.records.lock().unwrap().clone();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["name"], "Bob");
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let scratch = tempfile::tempdir().unwrap();
        let err = load_file(
            Path::new("/nonexistent/people.csv"),
            &config(scratch.path()),
            StdoutSink,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_local_notification_round_trips_key() {
        let payload = local_notification("a+b c.csv");
        let records = csv2dynamo_core::parse_trigger(&payload).unwrap();
        assert_eq!(records[0].bucket, LOCAL_BUCKET);
        assert_eq!(records[0].decoded_key().unwrap(), "a+b c.csv");
    }
}
