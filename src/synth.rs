//! `csv2dynamo synth`: render every stack to a CloudFormation template.

use anyhow::{Context, Result};
use clap::Args;
use csv2dynamo_config::ProvisioningContext;
use csv2dynamo_infra::{App, Manifest};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct SynthArgs {
    /// Provisioning context file (TOML, or cdk.json style JSON)
    #[arg(short, long, value_name = "FILE")]
    pub context: Option<PathBuf>,

    /// Output directory for templates and manifest.json
    #[arg(short, long, value_name = "DIR", default_value = "cdk.out")]
    pub out: PathBuf,
}

pub fn run(args: SynthArgs) -> Result<()> {
    let context = match &args.context {
        Some(path) => ProvisioningContext::load_from_path(path)
            .with_context(|| format!("Failed to load context from {}", path.display()))?,
        None => ProvisioningContext::discover()?,
    };

    let manifest = synth_to(&context, &args.out)?;

    println!();
    println!("Synthesized {} stacks into {}", manifest.stacks.len(), args.out.display());
    println!();
    println!("Deploy in this order:");
    for entry in &manifest.stacks {
        println!("  aws cloudformation deploy \\");
        println!("    --template-file {} \\", args.out.join(&entry.template).display());
        println!("    --stack-name {} \\", entry.name);
        println!("    --capabilities CAPABILITY_NAMED_IAM");
    }
    if context.loader_artifact.is_none() {
        println!();
        println!(
            "No loader_artifact in the context: deploy {} with",
            csv2dynamo_infra::stacks::STORAGE_STACK
        );
        println!("  --parameter-overrides LoaderCodeBucket=<bucket> LoaderCodeKey=<key>");
    }
    println!();

    Ok(())
}

/// Build the stacks for `context` and write them to `out_dir`.
pub fn synth_to(context: &ProvisioningContext, out_dir: &Path) -> Result<Manifest> {
    let app = App::from_context(context).context("Failed to assemble stacks")?;
    app.synth(out_dir)
        .with_context(|| format!("Failed to synthesize into {}", out_dir.display()))
}
