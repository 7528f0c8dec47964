//! Resource graph for the csv2dynamo deployment.
//!
//! The four stacks are plain Rust values built from a
//! [`ProvisioningContext`](csv2dynamo_config::ProvisioningContext) and
//! rendered to CloudFormation templates. Deploying them is left to
//! CloudFormation itself.

pub mod app;
pub mod error;
pub mod iam;
pub mod intrinsics;
pub mod stack;
pub mod stacks;
pub mod template;
pub mod vpc;

pub use app::{template_file_name, App, Manifest, ManifestEntry, MANIFEST_FILE};
pub use error::{InfraError, Result};
pub use iam::{Grant, GrantTarget, PolicyStatement};
pub use stack::{Stack, StackOutputs};
pub use template::{Output, Parameter, RemovalPolicy, Resource, Template};
