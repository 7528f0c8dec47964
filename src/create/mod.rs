//! Provisioning context generators

use anyhow::Result;
use clap::Subcommand;

mod aws;
mod names;

pub use aws::AwsArgs;

#[derive(Subcommand)]
pub enum CreateCommand {
    /// Write a context for the AWS stacks (csv2dynamo.toml)
    Aws(AwsArgs),
}

impl CreateCommand {
    pub fn run(self) -> Result<()> {
        match self {
            CreateCommand::Aws(args) => aws::run(args),
        }
    }
}
