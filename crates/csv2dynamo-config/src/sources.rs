// Configuration file discovery and parsing.
//
// Priority order:
// 1. Config file path from CSV2DYNAMO_CONFIG
// 2. Inline config content from CSV2DYNAMO_CONFIG_CONTENT (TOML)
// 3. Default config files (./csv2dynamo.toml, ./.csv2dynamo.toml)
// 4. ./cdk.json (provisioning context only)
//
// Files ending in .json are read as JSON (cdk.json layout: a top-level
// "context" object), everything else as TOML.

use crate::env_overrides::EnvSource;
use crate::FileConfig;
use anyhow::{Context, Result};
use std::path::Path;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["./csv2dynamo.toml", "./.csv2dynamo.toml"];
const CDK_CONTEXT_PATH: &str = "./cdk.json";

/// Parse config file contents, picking the format from the file extension.
pub fn parse_file_config(content: &str, path: Option<&Path>) -> Result<FileConfig> {
    let is_json = path
        .and_then(|p| p.extension())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(content).context("Failed to parse JSON config")
    } else {
        toml::from_str(content).context("Failed to parse TOML config")
    }
}

/// Load a config file from an explicit path.
/// Returns error if file doesn't exist or can't be parsed.
pub(crate) fn load_from_file_path(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_file_config(&content, Some(path))
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub(crate) fn load_from_env_or_defaults<E: EnvSource>(env: &E) -> Result<Option<FileConfig>> {
    if let Some(path) = env.get("CONFIG") {
        return load_from_file_path(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config = parse_file_config(&content, None)
            .context("Failed to parse inline config from CSV2DYNAMO_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path);
        if path.exists() {
            return load_from_file_path(path).map(Some);
        }
    }

    Ok(None)
}

/// Find the first config source that carries a provisioning context.
pub(crate) fn discover_context_file<E: EnvSource>(env: &E) -> Result<Option<FileConfig>> {
    if let Some(config) = load_from_env_or_defaults(env)? {
        if config.context.is_some() {
            return Ok(Some(config));
        }
    }

    let cdk = Path::new(CDK_CONTEXT_PATH);
    if cdk.exists() {
        tracing::debug!("Reading provisioning context from {}", CDK_CONTEXT_PATH);
        return load_from_file_path(cdk).map(Some);
    }

    Ok(None)
}
