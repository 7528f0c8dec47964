// AWS clients and loader settings shared by `load` and `invoke`

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, SdkConfig};
use csv2dynamo_config::LoaderConfig;

/// Shared SDK configuration, pointed at `endpoint` when one is given
/// (LocalStack, DynamoDB Local).
pub(crate) async fn sdk_config(endpoint: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(url) = endpoint {
        loader = loader.endpoint_url(url);
    }
    loader.load().await
}

/// S3 client; local endpoints only understand path-style addressing.
pub(crate) fn s3_client(sdk: &SdkConfig, path_style: bool) -> aws_sdk_s3::Client {
    let config = aws_sdk_s3::config::Builder::from(sdk)
        .force_path_style(path_style)
        .build();
    aws_sdk_s3::Client::from_conf(config)
}

/// Loader settings from file and environment, with command line flags on top.
pub(crate) fn loader_config(
    table: Option<String>,
    partition_key: Option<String>,
) -> Result<LoaderConfig> {
    let mut config = LoaderConfig::resolve().context("Failed to load loader configuration")?;
    if let Some(table) = table {
        config.table_name = table;
    }
    if partition_key.is_some() {
        config.partition_key_name = partition_key;
    }
    config.validate()?;
    Ok(config)
}
