//! AWS provisioning context wizard

use anyhow::{Context, Result};
use clap::Args;
use csv2dynamo_config::{
    ApplicationConfig, ArtifactLocation, DynamoDbConfig, ProvisioningContext,
};
use csv2dynamo_infra::{template_file_name, App};
use dialoguer::{Confirm, Input};
use std::fs;
use std::path::{Path, PathBuf};

use super::names;

#[derive(Args)]
pub struct AwsArgs {
    /// Prefix for the container and pipeline stacks and their resources
    #[arg(long)]
    pub namespace: Option<String>,

    /// Container image (and repository) name
    #[arg(long)]
    pub image_name: Option<String>,

    /// Image tag the build pushes
    #[arg(long)]
    pub image_tag: Option<String>,

    /// Branch the pipeline builds from
    #[arg(long)]
    pub branch: Option<String>,

    /// DynamoDB table the loader writes to
    #[arg(long)]
    pub table_name: Option<String>,

    /// Partition key attribute of the table (a CSV column)
    #[arg(long)]
    pub partition_key: Option<String>,

    /// Bucket holding the packaged loader zip
    #[arg(long)]
    pub loader_bucket: Option<String>,

    /// Object key of the packaged loader zip
    #[arg(long)]
    pub loader_key: Option<String>,

    /// Where to write the context
    #[arg(short, long, value_name = "FILE", default_value = "csv2dynamo.toml")]
    pub out: PathBuf,

    /// Overwrite existing file without asking
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: AwsArgs) -> Result<()> {
    println!();
    println!("csv2dynamo create - AWS stacks");
    println!();

    let namespace = prompt_or(args.namespace, "Namespace", Some(names::generate()), validate_namespace)?;
    let image_name = prompt_or(
        args.image_name,
        "Container image name",
        Some("express-app".to_string()),
        validate_image_name,
    )?;
    let image_tag = prompt_or(args.image_tag, "Image tag", Some("latest".to_string()), validate_not_blank)?;
    let branch = prompt_or(args.branch, "Source branch", Some("main".to_string()), validate_not_blank)?;
    let table_name = prompt_or(
        args.table_name,
        "DynamoDB table name",
        Some(format!("{}-records", namespace)),
        validate_table_name,
    )?;
    let partition_key_name = prompt_or(
        args.partition_key,
        "Partition key (CSV column)",
        Some("id".to_string()),
        validate_not_blank,
    )?;
    let loader_artifact = loader_artifact(args.loader_bucket, args.loader_key)?;

    let context = ProvisioningContext {
        namespace,
        application: ApplicationConfig {
            image_name,
            image_tag,
            branch,
        },
        dynamodb: DynamoDbConfig {
            table_name,
            partition_key_name,
        },
        loader_artifact,
    };
    context.validate()?;

    if !write_context(&context, &args.out, args.force)? {
        println!("Aborted.");
        return Ok(());
    }

    print_next_steps(&context, &args.out)
}

/// Write the context as TOML. Returns false when the user declines to
/// overwrite an existing file.
pub fn write_context(context: &ProvisioningContext, path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", path.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            return Ok(false);
        }
    }

    let content = context.to_toml()?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

fn print_next_steps(context: &ProvisioningContext, path: &Path) -> Result<()> {
    let app = App::from_context(context)?;
    let order = app.deployment_order()?;

    println!();
    println!("Created {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Synthesize:");
    println!("     csv2dynamo synth --context {}", path.display());
    println!("  2. Deploy, in order:");
    for stack in order {
        println!(
            "     aws cloudformation deploy --template-file cdk.out/{} --stack-name {} --capabilities CAPABILITY_NAMED_IAM",
            template_file_name(stack.name()),
            stack.name()
        );
    }
    println!();
    Ok(())
}

fn prompt_or(
    value: Option<String>,
    prompt: &str,
    default: Option<String>,
    validate: fn(&String) -> Result<(), String>,
) -> Result<String> {
    if let Some(value) = value {
        validate(&value).map_err(|e| anyhow::anyhow!("Invalid {}: {}", prompt.to_lowercase(), e))?;
        return Ok(value);
    }

    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default);
    }
    Ok(input.validate_with(validate).interact_text()?)
}

fn loader_artifact(bucket: Option<String>, key: Option<String>) -> Result<Option<ArtifactLocation>> {
    match (bucket, key) {
        (Some(bucket), Some(key)) => Ok(Some(ArtifactLocation { bucket, key })),
        (None, None) => {
            let hosted = Confirm::new()
                .with_prompt("Is the packaged loader (bootstrap zip) already in S3?")
                .default(false)
                .interact()?;
            if !hosted {
                return Ok(None);
            }
            let bucket = prompt_or(None, "Loader bucket", None, validate_not_blank)?;
            let key = prompt_or(None, "Loader key", Some("bootstrap.zip".to_string()), validate_not_blank)?;
            Ok(Some(ArtifactLocation { bucket, key }))
        }
        _ => anyhow::bail!("--loader-bucket and --loader-key must be given together"),
    }
}

#[allow(clippy::ptr_arg)]
fn validate_namespace(input: &String) -> Result<(), String> {
    if input.is_empty() {
        return Err("Namespace cannot be empty".to_string());
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Namespace must contain only lowercase letters, numbers, and hyphens".to_string());
    }
    if input.starts_with('-') || input.ends_with('-') {
        return Err("Namespace cannot start or end with a hyphen".to_string());
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn validate_image_name(input: &String) -> Result<(), String> {
    if input.is_empty() {
        return Err("Image name cannot be empty".to_string());
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err("Image name must contain only lowercase letters, numbers, '-' and '.'".to_string());
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn validate_table_name(input: &String) -> Result<(), String> {
    if input.len() < 3 || input.len() > 255 {
        return Err("Table name must be 3-255 characters".to_string());
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err("Table name may only contain letters, numbers, '_', '-' and '.'".to_string());
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn validate_not_blank(input: &String) -> Result<(), String> {
    if input.trim().is_empty() {
        return Err("Value cannot be empty".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(out: PathBuf) -> AwsArgs {
        AwsArgs {
            namespace: Some("demo".to_string()),
            image_name: Some("express-app".to_string()),
            image_tag: Some("latest".to_string()),
            branch: Some("main".to_string()),
            table_name: Some("people".to_string()),
            partition_key: Some("id".to_string()),
            loader_bucket: Some("artifacts".to_string()),
            loader_key: Some("loader/bootstrap.zip".to_string()),
            out,
            force: true,
        }
    }

    #[test]
    fn test_flags_skip_every_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("csv2dynamo.toml");

        run(args(out.clone())).unwrap();

        let context = ProvisioningContext::load_from_path(&out).unwrap();
        assert_eq!(context.namespace, "demo");
        assert_eq!(context.dynamodb.table_name, "people");
        assert_eq!(
            context.loader_artifact.map(|a| a.key).as_deref(),
            Some("loader/bootstrap.zip")
        );
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path().join("csv2dynamo.toml"));
        args.namespace = Some("Bad_Namespace".to_string());

        let err = run(args).unwrap_err();
        assert!(err.to_string().contains("Invalid namespace"));
    }

    #[test]
    fn test_loader_location_needs_both_parts() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path().join("csv2dynamo.toml"));
        args.loader_key = None;

        assert!(run(args).is_err());
    }

    #[test]
    fn test_validators() {
        assert!(validate_namespace(&"team-a1".to_string()).is_ok());
        assert!(validate_namespace(&"-team".to_string()).is_err());
        assert!(validate_image_name(&"web.app".to_string()).is_ok());
        assert!(validate_image_name(&"Web".to_string()).is_err());
        assert!(validate_table_name(&"ab".to_string()).is_err());
        assert!(validate_not_blank(&"  ".to_string()).is_err());
    }
}
