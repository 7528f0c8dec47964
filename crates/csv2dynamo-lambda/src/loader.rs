// Trigger handling: validate, then fetch, parse and write each object in turn

use csv2dynamo_config::LoaderConfig;
use csv2dynamo_core::{
    parse_csv, parse_trigger, scratch_file_name, LoaderResponse, NotificationRecord, Result,
};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::fetcher::ObjectFetcher;
use crate::sink::RecordSink;

/// Loads the CSV objects named in a trigger payload into one table.
pub struct Loader<F, S> {
    fetcher: F,
    sink: S,
    table_name: String,
    scratch_dir: PathBuf,
}

impl<F: ObjectFetcher, S: RecordSink> Loader<F, S> {
    pub fn new(fetcher: F, sink: S, table_name: impl Into<String>, scratch_dir: PathBuf) -> Self {
        Self {
            fetcher,
            sink,
            table_name: table_name.into(),
            scratch_dir,
        }
    }

    pub fn from_config(fetcher: F, sink: S, config: &LoaderConfig) -> Self {
        Self::new(
            fetcher,
            sink,
            config.table_name.clone(),
            config.scratch_dir.clone(),
        )
    }

    /// Handle one trigger payload.
    ///
    /// A malformed payload is answered with a 400 response before any I/O.
    /// Any failure while processing a record aborts the whole invocation;
    /// there is no partial-success response.
    pub async fn handle(&self, payload: &Value) -> Result<LoaderResponse> {
        let records = match parse_trigger(payload) {
            Ok(records) => records,
            Err(err) if err.is_malformed_event() => {
                error!(code = %err.code(), "Event is malformed: {}", err);
                return Ok(LoaderResponse::malformed());
            }
            Err(err) => return Err(err),
        };

        info!(records = records.len(), "Received event");

        let mut total = 0usize;
        for record in &records {
            total += self.process_record(record).await?;
        }

        info!(
            records = records.len(),
            items = total,
            "All notification records processed"
        );
        Ok(LoaderResponse::success())
    }

    async fn process_record(&self, record: &NotificationRecord) -> Result<usize> {
        let key = record.decoded_key()?;
        info!("Bucket is '{}' and Key is '{}'.", record.bucket, key);

        let download_path = self.scratch_dir.join(scratch_file_name(&key));
        info!("Downloading to: '{}'", download_path.display());

        let fetched = self
            .fetcher
            .fetch_to(&record.bucket, &key, &download_path)
            .await;
        let rows = match fetched {
            Ok(bytes) => {
                info!(bytes, "Download completed: '{}'", download_path.display());
                let content = tokio::fs::read(&download_path).await;
                remove_scratch(&download_path).await;
                parse_csv(content?.as_slice())?
            }
            Err(err) => {
                remove_scratch(&download_path).await;
                return Err(err);
            }
        };

        info!(rows = rows.len(), "Conversion completed.");
        self.sink.put_all(&self.table_name, rows).await
    }
}

async fn remove_scratch(path: &std::path::Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove scratch file '{}': {}", path.display(), err);
        }
    }
}
