// csv2dynamo-config - Configuration for the loader and for stack synthesis
//
// Loader configuration is layered:
// 1. Environment variables (highest priority)
// 2. Config file path from CSV2DYNAMO_CONFIG
// 3. Config file contents from CSV2DYNAMO_CONFIG_CONTENT
// 4. Default config file locations (./csv2dynamo.toml, ./.csv2dynamo.toml)
// 5. Platform-specific defaults (lowest priority)
//
// The provisioning context (namespace, application, table) comes from the
// `[context]` table of a TOML file or the `context` object of a cdk.json
// style JSON file, with CSV2DYNAMO_* environment overrides on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod env_overrides;
mod platform;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, StdEnvSource, ENV_PREFIX};
pub use platform::{Platform, PlatformDefaults};
pub use sources::{parse_file_config, DEFAULT_CONFIG_PATHS};

/// Largest number of put requests DynamoDB accepts in one batch write
pub const MAX_BATCH_SIZE: usize = 25;

/// Runtime configuration of the CSV loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Log verbosity, accepts tracing levels and Python-style names
    pub log_level: String,
    pub log_format: LogFormat,
    /// Destination table
    pub table_name: String,
    /// Partition key attribute, used to collapse duplicate keys within a batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key_name: Option<String>,
    /// Directory for per-invocation object downloads
    pub scratch_dir: PathBuf,
    pub batch_size: usize,
    pub max_unprocessed_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

/// Optional loader settings read from a config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoaderOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unprocessed_retries: Option<u32>,
}

impl LoaderOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parsed configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "LoaderOverrides::is_empty")]
    pub loader: LoaderOverrides,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ProvisioningContext>,
}

/// Values substituted into the resource graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningContext {
    pub namespace: String,
    pub application: ApplicationConfig,
    pub dynamodb: DynamoDbConfig,

    /// Where the packaged loader binary lives; becomes the template parameter defaults
    #[serde(
        default,
        alias = "loader-artifact",
        skip_serializing_if = "Option::is_none"
    )]
    pub loader_artifact: Option<ArtifactLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(alias = "image-name")]
    pub image_name: String,
    #[serde(alias = "image-tag")]
    pub image_tag: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamoDbConfig {
    #[serde(alias = "TABLE_NAME")]
    pub table_name: String,
    #[serde(alias = "PARTITION_KEY_NAME")]
    pub partition_key_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub key: String,
}

impl LoaderConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        Self::load_with_env(&StdEnvSource)
    }

    /// Same as [`LoaderConfig::load`] with a custom environment (useful for testing)
    pub fn load_with_env<E: EnvSource>(env: &E) -> Result<Self> {
        let config = Self::resolve_with_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Layer defaults, file and environment without validating, so callers
    /// can apply their own overrides first.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with_env(&StdEnvSource)
    }

    pub fn resolve_with_env<E: EnvSource>(env: &E) -> Result<Self> {
        let platform = Platform::detect(env);
        let mut config = Self::from_platform_defaults(platform);

        if let Some(file) = sources::load_from_env_or_defaults(env)? {
            config.merge(file.loader);
        }

        config.apply_env_overrides_from(env)?;
        Ok(config)
    }

    /// Construct a config that contains only platform defaults (no env or files).
    pub fn from_platform_defaults(platform: Platform) -> Self {
        let defaults = platform.defaults();
        Self {
            log_level: defaults.log_level.to_string(),
            log_format: defaults.log_format,
            table_name: String::new(),
            partition_key_name: None,
            scratch_dir: defaults.scratch_dir,
            batch_size: MAX_BATCH_SIZE,
            max_unprocessed_retries: defaults.max_unprocessed_retries,
        }
    }

    /// Merge file-provided settings into this config.
    pub fn merge(&mut self, other: LoaderOverrides) {
        if let Some(level) = other.log_level {
            self.log_level = level;
        }
        if let Some(format) = other.log_format {
            self.log_format = format;
        }
        if let Some(table) = other.table_name {
            self.table_name = table;
        }
        if other.partition_key_name.is_some() {
            self.partition_key_name = other.partition_key_name;
        }
        if let Some(dir) = other.scratch_dir {
            self.scratch_dir = dir;
        }
        if let Some(size) = other.batch_size {
            self.batch_size = size;
        }
        if let Some(retries) = other.max_unprocessed_retries {
            self.max_unprocessed_retries = retries;
        }
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_loader_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_loader_config(self)
    }

    /// tracing filter directive for the configured level
    pub fn filter_directive(&self) -> String {
        normalize_log_level(&self.log_level)
    }
}

impl ProvisioningContext {
    /// Load the context from an explicit file, then apply environment overrides.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_from_path_with_env(path, &StdEnvSource)
    }

    pub fn load_from_path_with_env<E: EnvSource>(path: impl AsRef<Path>, env: &E) -> Result<Self> {
        let path = path.as_ref();
        let file = sources::load_from_file_path(path)?;
        Self::from_file_config(file, env)
            .with_context(|| format!("Invalid provisioning context in {}", path.display()))
    }

    /// Look for the context in the default locations (and ./cdk.json).
    pub fn discover() -> Result<Self> {
        Self::discover_with_env(&StdEnvSource)
    }

    pub fn discover_with_env<E: EnvSource>(env: &E) -> Result<Self> {
        let file = sources::discover_context_file(env)?.ok_or_else(|| {
            anyhow::anyhow!(
                "No provisioning context found. Create one with `csv2dynamo create aws` \
                 or pass --context FILE"
            )
        })?;
        Self::from_file_config(file, env)
    }

    fn from_file_config<E: EnvSource>(file: FileConfig, env: &E) -> Result<Self> {
        let mut context = file
            .context
            .ok_or_else(|| anyhow::anyhow!("config file has no [context] section"))?;
        context.apply_env_overrides_from(env)?;
        context.validate()?;
        Ok(context)
    }

    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_context_overrides(self, env)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_context(self)
    }

    /// Render as a TOML config file with a `[context]` section.
    pub fn to_toml(&self) -> Result<String> {
        let file = FileConfig {
            loader: LoaderOverrides::default(),
            context: Some(self.clone()),
        };
        toml::to_string_pretty(&file).context("Failed to render context as TOML")
    }
}

/// Map a log level name to a tracing filter directive.
///
/// Accepts tracing names in any case plus the Python logging names the
/// function environment traditionally uses (WARNING, CRITICAL).
pub fn normalize_log_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    }
}
