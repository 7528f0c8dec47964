//! The four stacks of the deployment and the values they share.

use serde_json::{json, Value};

pub mod container_infra;
pub mod pipeline;
pub mod pipeline_base;
pub mod storage;

pub use container_infra::container_infra_stack;
pub use pipeline::pipeline_stack;
pub use pipeline_base::pipeline_base_stack;
pub use storage::storage_stack;

/// Export keys published by the container stack
pub mod container_exports {
    pub const REPOSITORY_NAME: &str = "RepositoryName";
    pub const REPOSITORY_ARN: &str = "RepositoryArn";
    pub const REPOSITORY_URI: &str = "RepositoryUri";
    pub const CLUSTER_NAME: &str = "ClusterName";
    pub const CLUSTER_ARN: &str = "ClusterArn";
    pub const SERVICE_NAME: &str = "ServiceName";
    pub const BUCKET_NAME: &str = "ArtifactBucketName";
    pub const BUCKET_ARN: &str = "ArtifactBucketArn";
}

/// Export keys published by the pipeline base stack
pub mod pipeline_base_exports {
    pub const CODE_REPOSITORY_NAME: &str = "CodeRepositoryName";
    pub const CODE_REPOSITORY_ARN: &str = "CodeRepositoryArn";
    pub const BUILD_PROJECT_NAME: &str = "BuildProjectName";
    pub const BUILD_PROJECT_ARN: &str = "BuildProjectArn";
}

pub const STORAGE_STACK: &str = "s3-to-dynamodb";

pub fn container_infra_stack_name(namespace: &str) -> String {
    format!("{}-container-infra", namespace)
}

pub fn pipeline_base_stack_name(namespace: &str) -> String {
    format!("{}-pipeline-base", namespace)
}

pub fn pipeline_stack_name(namespace: &str) -> String {
    format!("{}-pipeline", namespace)
}

/// Bucket properties shared by every bucket we create: SSE-S3, versioned and
/// closed to public access.
pub(crate) fn private_bucket_properties(bucket_name: Value) -> Value {
    json!({
        "BucketName": bucket_name,
        "BucketEncryption": {
            "ServerSideEncryptionConfiguration": [{
                "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
            }]
        },
        "VersioningConfiguration": { "Status": "Enabled" },
        "PublicAccessBlockConfiguration": {
            "BlockPublicAcls": true,
            "BlockPublicPolicy": true,
            "IgnorePublicAcls": true,
            "RestrictPublicBuckets": true,
        },
    })
}

#[cfg(test)]
pub(crate) fn sample_context() -> csv2dynamo_config::ProvisioningContext {
    use csv2dynamo_config::{
        ApplicationConfig, ArtifactLocation, DynamoDbConfig, ProvisioningContext,
    };

    ProvisioningContext {
        namespace: "demo".to_string(),
        application: ApplicationConfig {
            image_name: "express-app".to_string(),
            image_tag: "latest".to_string(),
            branch: "main".to_string(),
        },
        dynamodb: DynamoDbConfig {
            table_name: "people".to_string(),
            partition_key_name: "id".to_string(),
        },
        loader_artifact: Some(ArtifactLocation {
            bucket: "artifacts".to_string(),
            key: "loader/bootstrap.zip".to_string(),
        }),
    }
}
