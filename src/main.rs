use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;

/// Load CSV uploads into DynamoDB and synthesize the surrounding AWS stacks
#[derive(Parser)]
#[command(name = "csv2dynamo")]
#[command(version)]
#[command(about = "Load CSV uploads into DynamoDB and synthesize the surrounding AWS stacks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render CloudFormation templates for every stack
    Synth(csv2dynamo::synth::SynthArgs),
    /// Generate a provisioning context for a platform
    #[command(alias = "deploy")]
    Create {
        #[command(subcommand)]
        platform: csv2dynamo::create::CreateCommand,
    },
    /// Load a CSV file from disk into a table
    Load(csv2dynamo::load::LoadArgs),
    /// Replay a notification event against S3 and DynamoDB
    Invoke(csv2dynamo::invoke::InvokeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    csv2dynamo::init_cli_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Synth(args) => csv2dynamo::synth::run(args),
        Commands::Create { platform } => platform.run(),
        Commands::Load(args) => block_on(csv2dynamo::load::run(args)),
        Commands::Invoke(args) => block_on(csv2dynamo::invoke::run(args)),
    }
}

fn block_on(future: impl Future<Output = Result<()>>) -> Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(future)
}
