//! `{ns}-pipeline`: source, build and deploy stages wired to the resources
//! of the container and pipeline base stacks.

use csv2dynamo_config::ProvisioningContext;
use serde_json::{json, Value};

use super::{container_exports, pipeline_base_exports, pipeline_stack_name};
use crate::error::Result;
use crate::iam::{role, GrantTarget, PolicyStatement};
use crate::intrinsics::get_att;
use crate::stack::{default_policy_id, Stack, StackOutputs};
use crate::template::Resource;

pub const IMAGE_DEFINITIONS_FILE: &str = "imagedefinitions.json";
pub const SOURCE_ARTIFACT: &str = "Artifact_Source_CodeCommitSource";
pub const BUILD_ARTIFACT: &str = "Artifact_Build_DockerBuildImages";

pub const PIPELINE_ID: &str = "Pipeline";
pub const PIPELINE_ROLE_ID: &str = "PipelineRole";

const SOURCE_ACTIONS: &[&str] = &[
    "codecommit:GetBranch",
    "codecommit:GetCommit",
    "codecommit:UploadArchive",
    "codecommit:GetUploadArchiveStatus",
    "codecommit:CancelUploadArchive",
];
const BUILD_ACTIONS: &[&str] = &[
    "codebuild:BatchGetBuilds",
    "codebuild:StartBuild",
    "codebuild:StopBuild",
];
const DEPLOY_ACTIONS: &[&str] = &[
    "ecs:DescribeServices",
    "ecs:DescribeTaskDefinition",
    "ecs:DescribeTasks",
    "ecs:ListTasks",
    "ecs:RegisterTaskDefinition",
    "ecs:TagResource",
    "ecs:UpdateService",
];

pub fn pipeline_stack(
    context: &ProvisioningContext,
    container: &StackOutputs,
    base: &StackOutputs,
) -> Result<Stack> {
    let namespace = &context.namespace;
    let application = &context.application;
    let mut stack = Stack::new(
        pipeline_stack_name(namespace),
        format!("Delivery pipeline for {}", application.image_name),
    );

    let bucket_name = stack.import(container, container_exports::BUCKET_NAME)?;
    let bucket_arn = stack.import(container, container_exports::BUCKET_ARN)?;
    let cluster_name = stack.import(container, container_exports::CLUSTER_NAME)?;
    let service_name = stack.import(container, container_exports::SERVICE_NAME)?;
    let repository_name = stack.import(base, pipeline_base_exports::CODE_REPOSITORY_NAME)?;
    let repository_arn = stack.import(base, pipeline_base_exports::CODE_REPOSITORY_ARN)?;
    let project_name = stack.import(base, pipeline_base_exports::BUILD_PROJECT_NAME)?;
    let project_arn = stack.import(base, pipeline_base_exports::BUILD_PROJECT_ARN)?;

    stack.add_resource(
        PIPELINE_ROLE_ID,
        role("codepipeline.amazonaws.com", None, Vec::new()),
    )?;
    stack.grant_read_write(PIPELINE_ROLE_ID, &GrantTarget::Bucket(bucket_arn.clone()))?;
    stack.add_to_role_policy(
        PIPELINE_ROLE_ID,
        vec![
            PolicyStatement::allow(&["s3:*"], vec![bucket_arn]),
            PolicyStatement::allow(SOURCE_ACTIONS, vec![repository_arn]),
            PolicyStatement::allow(BUILD_ACTIONS, vec![project_arn]),
            PolicyStatement::allow_all(DEPLOY_ACTIONS),
            PolicyStatement::allow_all(&["iam:PassRole"]).with_condition(json!({
                "StringEqualsIfExists": {
                    "iam:PassedToService": ["ec2.amazonaws.com", "ecs-tasks.amazonaws.com"]
                }
            })),
        ],
    )?;

    let mut source = action(
        "CodeCommitSource",
        ("Source", "CodeCommit"),
        json!({
            "RepositoryName": repository_name,
            "BranchName": application.branch,
            "PollForSourceChanges": true,
        }),
        None,
        Some(SOURCE_ARTIFACT),
    );
    source["Namespace"] = json!(namespace);

    let build = action(
        "DockerBuildImages",
        ("Build", "CodeBuild"),
        json!({ "ProjectName": project_name }),
        Some(SOURCE_ARTIFACT),
        Some(BUILD_ARTIFACT),
    );
    let deploy = action(
        "DeployAction",
        ("Deploy", "ECS"),
        json!({
            "ClusterName": cluster_name,
            "ServiceName": service_name,
            "FileName": IMAGE_DEFINITIONS_FILE,
        }),
        Some(BUILD_ARTIFACT),
        None,
    );

    let pipeline = stack.add_resource(
        PIPELINE_ID,
        Resource::new(
            "AWS::CodePipeline::Pipeline",
            json!({
                "Name": format!("{}-{}-pipeline", namespace, application.image_name),
                "RoleArn": get_att(PIPELINE_ROLE_ID, "Arn"),
                "ArtifactStore": { "Type": "S3", "Location": bucket_name },
                "Stages": [
                    { "Name": "Source", "Actions": [source] },
                    { "Name": "Build", "Actions": [build] },
                    { "Name": "Deploy", "Actions": [deploy] },
                ],
            }),
        )
        .depends_on(PIPELINE_ROLE_ID)
        .depends_on(&default_policy_id(PIPELINE_ROLE_ID)),
    )?;

    stack.add_output("PipelineOut", pipeline, Some("Pipeline"))?;

    Ok(stack)
}

/// One pipeline action owned by AWS, run first in its stage.
fn action(
    name: &str,
    (category, provider): (&str, &str),
    configuration: Value,
    input: Option<&str>,
    output: Option<&str>,
) -> Value {
    let mut action = json!({
        "Name": name,
        "ActionTypeId": {
            "Category": category,
            "Owner": "AWS",
            "Provider": provider,
            "Version": "1",
        },
        "Configuration": configuration,
        "RunOrder": 1,
    });
    if let Some(input) = input {
        action["InputArtifacts"] = json!([{ "Name": input }]);
    }
    if let Some(output) = output {
        action["OutputArtifacts"] = json!([{ "Name": output }]);
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::{container_infra_stack, pipeline_base_stack, sample_context};

    fn stack() -> Stack {
        let context = sample_context();
        let container = container_infra_stack(&context).unwrap().outputs();
        let base = pipeline_base_stack(&context, &container).unwrap().outputs();
        pipeline_stack(&context, &container, &base).unwrap()
    }

    fn stages(stack: &Stack) -> Vec<Value> {
        stack.template().resource(PIPELINE_ID).unwrap().properties["Stages"]
            .as_array()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_depends_on_both_upstream_stacks() {
        let stack = stack();
        assert_eq!(
            stack.dependencies().collect::<Vec<_>>(),
            vec!["demo-container-infra", "demo-pipeline-base"]
        );
    }

    #[test]
    fn test_stages_in_order() {
        let stack = stack();
        let names: Vec<_> = stages(&stack)
            .iter()
            .map(|s| s["Name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Source", "Build", "Deploy"]);
    }

    #[test]
    fn test_source_polls_configured_branch() {
        let stack = stack();
        let stages = stages(&stack);
        let source = &stages[0]["Actions"][0];

        assert_eq!(source["Name"], "CodeCommitSource");
        assert_eq!(source["Namespace"], "demo");
        assert_eq!(source["Configuration"]["BranchName"], "main");
        assert_eq!(source["Configuration"]["PollForSourceChanges"], true);
    }

    #[test]
    fn test_deploy_reads_image_definitions_from_build_output() {
        let stack = stack();
        let stages = stages(&stack);
        let build = &stages[1]["Actions"][0];
        let deploy = &stages[2]["Actions"][0];

        assert_eq!(build["Name"], "DockerBuildImages");
        assert_eq!(deploy["ActionTypeId"]["Provider"], "ECS");
        assert_eq!(deploy["Configuration"]["FileName"], "imagedefinitions.json");
        assert_eq!(
            deploy["InputArtifacts"][0]["Name"],
            build["OutputArtifacts"][0]["Name"]
        );
    }

    #[test]
    fn test_role_has_full_access_on_artifact_bucket() {
        let stack = stack();
        let policy = &stack
            .template()
            .resource(&default_policy_id(PIPELINE_ROLE_ID))
            .unwrap()
            .properties;
        let statements = policy["PolicyDocument"]["Statement"].as_array().unwrap();
        let bucket_arn = json!({ "Fn::ImportValue": "demo-container-infra:ArtifactBucketArn" });

        assert!(statements
            .iter()
            .any(|s| s["Action"] == json!(["s3:*"]) && s["Resource"] == json!([bucket_arn])));
        assert!(statements
            .iter()
            .any(|s| s["Action"] == json!(["iam:PassRole"]) && s.get("Condition").is_some()));
    }

    #[test]
    fn test_pipeline_name_output() {
        let stack = stack();
        let props = &stack.template().resource(PIPELINE_ID).unwrap().properties;
        assert_eq!(props["Name"], "demo-express-app-pipeline");
        assert_eq!(
            stack.template().outputs["PipelineOut"].value,
            json!({ "Ref": "Pipeline" })
        );
    }
}
