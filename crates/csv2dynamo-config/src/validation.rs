// Configuration validation
//
// Names end up in AWS resource names, so the checks follow the naming rules
// of the services they are used for.

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_loader_config(config: &LoaderConfig) -> Result<()> {
    if config.log_level.trim().is_empty() {
        bail!("loader.log_level must not be empty");
    }

    validate_table_name(&config.table_name)
        .map_err(|e| anyhow::anyhow!("loader.table_name: {} (set TABLE_NAME)", e))?;

    if config.batch_size == 0 || config.batch_size > MAX_BATCH_SIZE {
        bail!(
            "loader.batch_size must be between 1 and {} (got {})",
            MAX_BATCH_SIZE,
            config.batch_size
        );
    }

    if config.scratch_dir.as_os_str().is_empty() {
        bail!("loader.scratch_dir must not be empty");
    }

    if config.max_unprocessed_retries > 20 {
        warn!(
            max_unprocessed_retries = config.max_unprocessed_retries,
            "loader.max_unprocessed_retries is very large; invocations may time out"
        );
    }

    Ok(())
}

pub fn validate_context(context: &ProvisioningContext) -> Result<()> {
    validate_namespace(&context.namespace)?;

    let app = &context.application;
    if app.image_name.is_empty() {
        bail!("application.image_name must not be empty");
    }
    if !app
        .image_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        bail!(
            "application.image_name '{}' must contain only lowercase letters, numbers, '-' and '.'",
            app.image_name
        );
    }
    if app.image_tag.is_empty() || app.image_tag.chars().any(char::is_whitespace) {
        bail!("application.image_tag must be non-empty and contain no whitespace");
    }
    if app.branch.trim().is_empty() {
        bail!("application.branch must not be empty");
    }

    // Artifact bucket is "{namespace}-{image}-{12 digit account id}"
    let bucket_len = context.namespace.len() + app.image_name.len() + 14;
    if bucket_len > 63 {
        bail!(
            "namespace and image name are too long: artifact bucket name would be {} characters (max 63)",
            bucket_len
        );
    }

    validate_table_name(&context.dynamodb.table_name)
        .map_err(|e| anyhow::anyhow!("dynamodb.table_name: {}", e))?;
    if context.dynamodb.partition_key_name.is_empty()
        || context.dynamodb.partition_key_name.len() > 255
    {
        bail!("dynamodb.partition_key_name must be 1-255 characters");
    }

    if let Some(artifact) = &context.loader_artifact {
        if artifact.bucket.is_empty() || artifact.key.is_empty() {
            bail!("loader_artifact requires both bucket and key");
        }
    }

    Ok(())
}

fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        bail!("namespace must not be empty");
    }
    if !namespace
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "namespace '{}' must contain only lowercase letters, numbers, and hyphens",
            namespace
        );
    }
    if namespace.starts_with('-') || namespace.ends_with('-') {
        bail!("namespace cannot start or end with a hyphen");
    }
    Ok(())
}

fn validate_table_name(name: &str) -> std::result::Result<(), String> {
    if name.len() < 3 || name.len() > 255 {
        return Err(format!("table name must be 3-255 characters (got '{}')", name));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(format!(
            "table name '{}' may only contain letters, numbers, '_', '-' and '.'",
            name
        ));
    }
    Ok(())
}
