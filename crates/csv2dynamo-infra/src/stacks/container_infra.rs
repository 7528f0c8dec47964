//! `{ns}-container-infra`: image repository, network, cluster, the
//! load-balanced Fargate service and the pipeline artifact bucket.

use csv2dynamo_config::ProvisioningContext;
use serde_json::json;

use super::{container_exports as exports, container_infra_stack_name, private_bucket_properties};
use crate::error::Result;
use crate::iam::{role, PolicyStatement};
use crate::intrinsics::{get_att, join, reference, sub, REGION};
use crate::stack::{default_policy_id, Stack};
use crate::template::{RemovalPolicy, Resource};
use crate::vpc::{add_vpc, VpcProps};

pub const CONTAINER_NAME: &str = "flask-app";
pub const CONTAINER_IMAGE: &str = "bitnami/express";
pub const CONTAINER_PORT: u16 = 3000;
pub const LISTENER_PORT: u16 = 80;
pub const LOG_STREAM_PREFIX: &str = "ecs-logs";
pub const TASK_ROLE_NAME: &str = "EcsTaskRole";
const MAX_CAPACITY: u32 = 3;
const TARGET_CPU_PERCENT: u32 = 80;
const COOLDOWN_SECONDS: u32 = 60;

pub const REPOSITORY_ID: &str = "EcrRepository";
pub const VPC_ID: &str = "Vpc";
pub const CLUSTER_ID: &str = "EcsCluster";
pub const TASK_ROLE_ID: &str = "EcsTaskRole";
pub const EXECUTION_ROLE_ID: &str = "EcsTaskdefExecutionRole";
pub const LOG_GROUP_ID: &str = "EcsTaskdefLogGroup";
pub const TASK_DEFINITION_ID: &str = "EcsTaskdef";
pub const LB_SECURITY_GROUP_ID: &str = "EcsServiceLBSecurityGroup";
pub const LOAD_BALANCER_ID: &str = "EcsServiceLB";
pub const TARGET_GROUP_ID: &str = "EcsServiceLBTargetGroup";
pub const LISTENER_ID: &str = "EcsServiceLBPublicListener";
pub const SERVICE_SECURITY_GROUP_ID: &str = "EcsServiceSecurityGroup";
pub const SERVICE_ID: &str = "EcsService";
pub const SCALABLE_TARGET_ID: &str = "EcsServiceTaskCount";
pub const SCALING_POLICY_ID: &str = "EcsServiceTaskCountCpuScaling";
pub const ARTIFACT_BUCKET_ID: &str = "PipelineArtifactsBucket";

/// Pull and log permissions the task execution role needs
const EXECUTION_ACTIONS: &[&str] = &[
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

pub fn container_infra_stack(context: &ProvisioningContext) -> Result<Stack> {
    let namespace = &context.namespace;
    let image = &context.application.image_name;
    let mut stack = Stack::new(
        container_infra_stack_name(namespace),
        format!("Container infrastructure for {}", image),
    );

    let repository = stack.add_resource(
        REPOSITORY_ID,
        Resource::new(
            "AWS::ECR::Repository",
            json!({ "RepositoryName": format!("{}/{}", namespace, image) }),
        )
        .removal_policy(RemovalPolicy::Delete),
    )?;

    let vpc = add_vpc(&mut stack, VPC_ID, &VpcProps::default())?;
    let cluster = stack.add_resource(CLUSTER_ID, Resource::new("AWS::ECS::Cluster", json!({})))?;

    // Task definition
    stack.add_resource(
        TASK_ROLE_ID,
        role("ecs-tasks.amazonaws.com", Some(TASK_ROLE_NAME), Vec::new()),
    )?;
    stack.add_resource(
        EXECUTION_ROLE_ID,
        role("ecs-tasks.amazonaws.com", None, Vec::new()),
    )?;
    stack.add_to_role_policy(
        EXECUTION_ROLE_ID,
        vec![PolicyStatement::allow_all(EXECUTION_ACTIONS)],
    )?;
    let log_group = stack.add_resource(
        LOG_GROUP_ID,
        Resource::new("AWS::Logs::LogGroup", json!({})).removal_policy(RemovalPolicy::Retain),
    )?;
    let task_definition = stack.add_resource(
        TASK_DEFINITION_ID,
        Resource::new(
            "AWS::ECS::TaskDefinition",
            json!({
                "RequiresCompatibilities": ["FARGATE"],
                "NetworkMode": "awsvpc",
                "Cpu": "256",
                "Memory": "512",
                "TaskRoleArn": get_att(TASK_ROLE_ID, "Arn"),
                "ExecutionRoleArn": get_att(EXECUTION_ROLE_ID, "Arn"),
                "ContainerDefinitions": [{
                    "Name": CONTAINER_NAME,
                    "Image": CONTAINER_IMAGE,
                    "Essential": true,
                    "Memory": 256,
                    "Cpu": 256,
                    "PortMappings": [{ "ContainerPort": CONTAINER_PORT, "Protocol": "tcp" }],
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-group": log_group,
                            "awslogs-stream-prefix": LOG_STREAM_PREFIX,
                            "awslogs-region": reference(REGION),
                        }
                    },
                }],
            }),
        )
        .depends_on(&default_policy_id(EXECUTION_ROLE_ID)),
    )?;

    // Public load balancer in front of the service
    stack.add_resource(
        LB_SECURITY_GROUP_ID,
        Resource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": "Public HTTP access to the load balancer",
                "VpcId": vpc.vpc_id,
                "SecurityGroupIngress": [{
                    "CidrIp": "0.0.0.0/0",
                    "IpProtocol": "tcp",
                    "FromPort": LISTENER_PORT,
                    "ToPort": LISTENER_PORT,
                }],
            }),
        ),
    )?;
    let mut load_balancer = Resource::new(
        "AWS::ElasticLoadBalancingV2::LoadBalancer",
        json!({
            "Type": "application",
            "Scheme": "internet-facing",
            "Subnets": vpc.public_subnets,
            "SecurityGroups": [get_att(LB_SECURITY_GROUP_ID, "GroupId")],
        }),
    );
    for idx in 1..=vpc.public_subnets.len() {
        load_balancer = load_balancer.depends_on(&format!("{}PublicSubnet{}DefaultRoute", VPC_ID, idx));
    }
    let load_balancer = stack.add_resource(LOAD_BALANCER_ID, load_balancer)?;
    let target_group = stack.add_resource(
        TARGET_GROUP_ID,
        Resource::new(
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            json!({
                "Port": LISTENER_PORT,
                "Protocol": "HTTP",
                "TargetType": "ip",
                "VpcId": vpc.vpc_id,
            }),
        ),
    )?;
    stack.add_resource(
        LISTENER_ID,
        Resource::new(
            "AWS::ElasticLoadBalancingV2::Listener",
            json!({
                "LoadBalancerArn": load_balancer,
                "Port": LISTENER_PORT,
                "Protocol": "HTTP",
                "DefaultActions": [{ "Type": "forward", "TargetGroupArn": target_group }],
            }),
        ),
    )?;

    // Fargate service in the private subnets
    stack.add_resource(
        SERVICE_SECURITY_GROUP_ID,
        Resource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": "Load balancer access to the service",
                "VpcId": vpc.vpc_id,
                "SecurityGroupIngress": [{
                    "SourceSecurityGroupId": get_att(LB_SECURITY_GROUP_ID, "GroupId"),
                    "IpProtocol": "tcp",
                    "FromPort": CONTAINER_PORT,
                    "ToPort": CONTAINER_PORT,
                }],
            }),
        ),
    )?;
    let mut service = Resource::new(
        "AWS::ECS::Service",
        json!({
            "Cluster": cluster,
            "LaunchType": "FARGATE",
            "DesiredCount": 1,
            "TaskDefinition": task_definition,
            "HealthCheckGracePeriodSeconds": 60,
            "DeploymentConfiguration": { "MaximumPercent": 200, "MinimumHealthyPercent": 50 },
            "LoadBalancers": [{
                "ContainerName": CONTAINER_NAME,
                "ContainerPort": CONTAINER_PORT,
                "TargetGroupArn": target_group,
            }],
            "NetworkConfiguration": {
                "AwsvpcConfiguration": {
                    "AssignPublicIp": "DISABLED",
                    "Subnets": vpc.private_subnets,
                    "SecurityGroups": [get_att(SERVICE_SECURITY_GROUP_ID, "GroupId")],
                }
            },
        }),
    )
    .depends_on(LISTENER_ID);
    for route in &vpc.private_routes {
        service = service.depends_on(route);
    }
    stack.add_resource(SERVICE_ID, service)?;

    // CPU target tracking
    let scalable_target = stack.add_resource(
        SCALABLE_TARGET_ID,
        Resource::new(
            "AWS::ApplicationAutoScaling::ScalableTarget",
            json!({
                "MinCapacity": 1,
                "MaxCapacity": MAX_CAPACITY,
                "ResourceId": join("/", vec![
                    json!("service"),
                    cluster.clone(),
                    get_att(SERVICE_ID, "Name"),
                ]),
                "RoleARN": sub(
                    "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/aws-service-role/\
                     ecs.application-autoscaling.amazonaws.com/\
                     AWSServiceRoleForApplicationAutoScaling_ECSService",
                ),
                "ScalableDimension": "ecs:service:DesiredCount",
                "ServiceNamespace": "ecs",
            }),
        ),
    )?;
    stack.add_resource(
        SCALING_POLICY_ID,
        Resource::new(
            "AWS::ApplicationAutoScaling::ScalingPolicy",
            json!({
                "PolicyName": format!("{}CpuScaling", SERVICE_ID),
                "PolicyType": "TargetTrackingScaling",
                "ScalingTargetId": scalable_target,
                "TargetTrackingScalingPolicyConfiguration": {
                    "PredefinedMetricSpecification": {
                        "PredefinedMetricType": "ECSServiceAverageCPUUtilization"
                    },
                    "TargetValue": TARGET_CPU_PERCENT,
                    "ScaleInCooldown": COOLDOWN_SECONDS,
                    "ScaleOutCooldown": COOLDOWN_SECONDS,
                },
            }),
        ),
    )?;

    let bucket = stack.add_resource(
        ARTIFACT_BUCKET_ID,
        Resource::new(
            "AWS::S3::Bucket",
            private_bucket_properties(sub(&format!("{}-{}-${{AWS::AccountId}}", namespace, image))),
        )
        .removal_policy(RemovalPolicy::Delete),
    )?;

    stack.add_output(
        "LBOut",
        get_att(LOAD_BALANCER_ID, "DNSName"),
        Some("Load balancer DNS name"),
    )?;
    stack.export(exports::REPOSITORY_NAME, repository, None)?;
    stack.export(exports::REPOSITORY_ARN, get_att(REPOSITORY_ID, "Arn"), None)?;
    stack.export(
        exports::REPOSITORY_URI,
        get_att(REPOSITORY_ID, "RepositoryUri"),
        None,
    )?;
    stack.export(exports::CLUSTER_NAME, cluster, None)?;
    stack.export(exports::CLUSTER_ARN, get_att(CLUSTER_ID, "Arn"), None)?;
    stack.export(exports::SERVICE_NAME, get_att(SERVICE_ID, "Name"), None)?;
    stack.export(exports::BUCKET_NAME, bucket, None)?;
    stack.export(exports::BUCKET_ARN, get_att(ARTIFACT_BUCKET_ID, "Arn"), None)?;

    Ok(stack)
}
