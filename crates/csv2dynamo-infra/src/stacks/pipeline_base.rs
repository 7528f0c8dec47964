//! `{ns}-pipeline-base`: source repository and the image build project.

use csv2dynamo_config::ProvisioningContext;
use serde_json::{json, Value};

use super::{container_exports, pipeline_base_exports as exports, pipeline_base_stack_name};
use crate::error::Result;
use crate::iam::{role, GrantTarget, PolicyStatement};
use crate::intrinsics::{get_att, reference, sub, ACCOUNT_ID};
use crate::stack::{default_policy_id, Stack, StackOutputs};
use crate::template::Resource;

pub const BUILD_SPEC: &str = "buildspec.yml";
pub const BUILD_IMAGE: &str = "aws/codebuild/standard:7.0";
const BUILD_TIMEOUT_MINUTES: u32 = 60;

pub const CODE_REPOSITORY_ID: &str = "CodeCommitRepo";
pub const BUILD_ROLE_ID: &str = "CodeBuildDockerRole";
pub const BUILD_PROJECT_ID: &str = "CodeBuildDocker";

/// Statement letting the build inspect the cluster and read images
const CLUSTER_ACTIONS: &[&str] = &[
    "ecs:DescribeCluster",
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:BatchGetImage",
    "ecr:GetDownloadUrlForLayer",
];

pub fn pipeline_base_stack(
    context: &ProvisioningContext,
    container: &StackOutputs,
) -> Result<Stack> {
    let namespace = &context.namespace;
    let application = &context.application;
    let image = &application.image_name;
    let mut stack = Stack::new(
        pipeline_base_stack_name(namespace),
        format!("Source repository and image build for {}", image),
    );

    let repository_uri = stack.import(container, container_exports::REPOSITORY_URI)?;
    let repository_arn = stack.import(container, container_exports::REPOSITORY_ARN)?;
    let cluster_arn = stack.import(container, container_exports::CLUSTER_ARN)?;

    let code_repository = stack.add_resource(
        CODE_REPOSITORY_ID,
        Resource::new(
            "AWS::CodeCommit::Repository",
            json!({
                "RepositoryName": format!("{}-{}", namespace, image),
                "RepositoryDescription": format!("Code repository for {}", image),
            }),
        ),
    )?;

    let project_name = format!("{}-{}-docker-build", namespace, image);
    stack.add_resource(
        BUILD_ROLE_ID,
        role("codebuild.amazonaws.com", None, Vec::new()),
    )?;
    stack.add_to_role_policy(BUILD_ROLE_ID, vec![build_logs_statement(&project_name)])?;
    stack.grant_read(
        BUILD_ROLE_ID,
        &GrantTarget::CodeRepository(get_att(CODE_REPOSITORY_ID, "Arn")),
    )?;
    stack.grant_pull_push(BUILD_ROLE_ID, &GrantTarget::Repository(repository_arn))?;
    stack.add_to_role_policy(
        BUILD_ROLE_ID,
        vec![PolicyStatement::allow(CLUSTER_ACTIONS, vec![cluster_arn])],
    )?;

    let environment_variables = vec![
        build_variable("ECR_REPOSITORY_URL", repository_uri),
        build_variable("IMAGE_NAME", json!(image)),
        build_variable("IMAGE_TAG", json!(application.image_tag)),
        build_variable("AWS_ACCOUNT_ID", reference(ACCOUNT_ID)),
    ];
    let project = stack.add_resource(
        BUILD_PROJECT_ID,
        Resource::new(
            "AWS::CodeBuild::Project",
            json!({
                "Name": project_name,
                "Description": "Pipeline for CodeBuild",
                "ServiceRole": get_att(BUILD_ROLE_ID, "Arn"),
                "Source": { "Type": "CODEPIPELINE", "BuildSpec": BUILD_SPEC },
                "Artifacts": { "Type": "CODEPIPELINE" },
                "Environment": {
                    "Type": "LINUX_CONTAINER",
                    "ComputeType": "BUILD_GENERAL1_SMALL",
                    "Image": BUILD_IMAGE,
                    "ImagePullCredentialsType": "CODEBUILD",
                    "PrivilegedMode": true,
                    "EnvironmentVariables": environment_variables,
                },
                "TimeoutInMinutes": BUILD_TIMEOUT_MINUTES,
            }),
        )
        .depends_on(&default_policy_id(BUILD_ROLE_ID)),
    )?;

    stack.add_output(
        "CodeCommitSSH",
        get_att(CODE_REPOSITORY_ID, "CloneUrlSsh"),
        Some("Code Commit Repository SSH URL"),
    )?;
    stack.export(exports::CODE_REPOSITORY_NAME, code_repository, None)?;
    stack.export(
        exports::CODE_REPOSITORY_ARN,
        get_att(CODE_REPOSITORY_ID, "Arn"),
        None,
    )?;
    stack.export(exports::BUILD_PROJECT_NAME, project, None)?;
    stack.export(
        exports::BUILD_PROJECT_ARN,
        get_att(BUILD_PROJECT_ID, "Arn"),
        None,
    )?;

    Ok(stack)
}

fn build_variable(name: &str, value: Value) -> Value {
    json!({ "Name": name, "Type": "PLAINTEXT", "Value": value })
}

/// CodeBuild writes its logs to `/aws/codebuild/<project>`
fn build_logs_statement(project_name: &str) -> PolicyStatement {
    let log_group = format!(
        "arn:${{AWS::Partition}}:logs:${{AWS::Region}}:${{AWS::AccountId}}:log-group:/aws/codebuild/{}",
        project_name
    );
    PolicyStatement::allow(
        &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
        vec![sub(&log_group), sub(&format!("{}:*", log_group))],
    )
}
