use super::{ArtifactLocation, LoaderConfig, ProvisioningContext};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "CSV2DYNAMO_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Get an environment variable with the CSV2DYNAMO_ prefix applied
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the CSV2DYNAMO_ prefix
    /// Used for the variables the provisioned function sets (LOG_LEVEL, TABLE_NAME)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Apply environment-variable overrides (highest priority) to the loader config.
///
/// Unprefixed variables come first so that an explicit CSV2DYNAMO_* value wins.
pub fn apply_loader_overrides<E: EnvSource>(config: &mut LoaderConfig, env: &E) -> Result<()> {
    // Variables set on the function by the storage stack
    if let Some(level) = non_empty(env.get_raw("LOG_LEVEL")) {
        config.log_level = level;
    }
    if let Some(table) = non_empty(env.get_raw("TABLE_NAME")) {
        config.table_name = table;
    }
    if let Some(key) = non_empty(env.get_raw("PARTITION_KEY_NAME")) {
        config.partition_key_name = Some(key);
    }

    if let Some(level) = non_empty(env.get("LOG_LEVEL")) {
        config.log_level = level;
    }
    if let Some(format) = non_empty(env.get("LOG_FORMAT")) {
        config.log_format = format
            .parse()
            .context("Invalid CSV2DYNAMO_LOG_FORMAT value")?;
    }
    if let Some(table) = non_empty(env.get("TABLE_NAME")) {
        config.table_name = table;
    }
    if let Some(key) = non_empty(env.get("PARTITION_KEY_NAME")) {
        config.partition_key_name = Some(key);
    }
    if let Some(dir) = non_empty(env.get("SCRATCH_DIR")) {
        config.scratch_dir = PathBuf::from(dir);
    }
    if let Some(size) = get_env_parsed::<usize, E>(env, "BATCH_SIZE")? {
        config.batch_size = size;
    }
    if let Some(retries) = get_env_parsed::<u32, E>(env, "MAX_UNPROCESSED_RETRIES")? {
        config.max_unprocessed_retries = retries;
    }

    Ok(())
}

/// Apply environment-variable overrides to the provisioning context.
pub fn apply_context_overrides<E: EnvSource>(
    context: &mut ProvisioningContext,
    env: &E,
) -> Result<()> {
    if let Some(namespace) = non_empty(env.get("NAMESPACE")) {
        context.namespace = namespace;
    }
    if let Some(image) = non_empty(env.get("IMAGE_NAME")) {
        context.application.image_name = image;
    }
    if let Some(tag) = non_empty(env.get("IMAGE_TAG")) {
        context.application.image_tag = tag;
    }
    if let Some(branch) = non_empty(env.get("BRANCH")) {
        context.application.branch = branch;
    }
    if let Some(table) = non_empty(env.get("TABLE_NAME")) {
        context.dynamodb.table_name = table;
    }
    if let Some(key) = non_empty(env.get("PARTITION_KEY_NAME")) {
        context.dynamodb.partition_key_name = key;
    }
    if let Some(bucket) = non_empty(env.get("LOADER_CODE_BUCKET")) {
        ensure_artifact(context).bucket = bucket;
    }
    if let Some(key) = non_empty(env.get("LOADER_CODE_KEY")) {
        ensure_artifact(context).key = key;
    }

    Ok(())
}

fn ensure_artifact(context: &mut ProvisioningContext) -> &mut ArtifactLocation {
    context
        .loader_artifact
        .get_or_insert_with(|| ArtifactLocation {
            bucket: String::new(),
            key: String::new(),
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn get_env_parsed<T, E>(env: &E, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    E: EnvSource,
{
    match non_empty(env.get(key)) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogFormat, Platform};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapEnv {
        vars: HashMap<String, String>,
    }

    impl MapEnv {
        fn with(mut self, key: &str, value: &str) -> Self {
            self.vars.insert(key.to_string(), value.to_string());
            self
        }
    }

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn test_function_environment_is_applied() {
        let env = MapEnv::default()
            .with("LOG_LEVEL", "INFO")
            .with("TABLE_NAME", "people")
            .with("PARTITION_KEY_NAME", "id");
        let mut config = LoaderConfig::from_platform_defaults(Platform::Lambda);

        apply_loader_overrides(&mut config, &env).unwrap();

        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.table_name, "people");
        assert_eq!(config.partition_key_name.as_deref(), Some("id"));
    }

    #[test]
    fn test_prefixed_values_win() {
        let env = MapEnv::default()
            .with("TABLE_NAME", "people")
            .with("CSV2DYNAMO_TABLE_NAME", "people-staging")
            .with("CSV2DYNAMO_LOG_FORMAT", "text")
            .with("CSV2DYNAMO_BATCH_SIZE", "10");
        let mut config = LoaderConfig::from_platform_defaults(Platform::Lambda);

        apply_loader_overrides(&mut config, &env).unwrap();

        assert_eq!(config.table_name, "people-staging");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_unparsable_number_is_an_error() {
        let env = MapEnv::default().with("CSV2DYNAMO_BATCH_SIZE", "many");
        let mut config = LoaderConfig::from_platform_defaults(Platform::Local);

        let err = apply_loader_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("CSV2DYNAMO_BATCH_SIZE"));
    }

    #[test]
    fn test_context_overrides() {
        let mut context: ProvisioningContext = toml::from_str::<crate::FileConfig>(
            r#"
            [context]
            namespace = "demo"
            [context.application]
            image_name = "express-app"
            image_tag = "latest"
            branch = "main"
            [context.dynamodb]
            table_name = "people"
            partition_key_name = "id"
            "#,
        )
        .unwrap()
        .context
        .unwrap();

        let env = MapEnv::default()
            .with("CSV2DYNAMO_NAMESPACE", "prod")
            .with("CSV2DYNAMO_IMAGE_TAG", "v2")
            .with("CSV2DYNAMO_LOADER_CODE_BUCKET", "artifacts");
        apply_context_overrides(&mut context, &env).unwrap();

        assert_eq!(context.namespace, "prod");
        assert_eq!(context.application.image_tag, "v2");
        assert_eq!(context.application.image_name, "express-app");
        let artifact = context.loader_artifact.unwrap();
        assert_eq!(artifact.bucket, "artifacts");
        assert!(artifact.key.is_empty());
    }
}
