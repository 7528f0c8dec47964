//! IAM policy statements, roles and resource grants.
//!
//! Grants follow the usual least-privilege action sets per resource kind and
//! are scoped to the ARN of the resource being granted on.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{InfraError, Result};
use crate::intrinsics::{arn_with_suffix, reference};
use crate::template::Resource;

const BUCKET_READ_ACTIONS: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];
const BUCKET_WRITE_ACTIONS: &[&str] = &[
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];
const TABLE_READ_ACTIONS: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
];
const TABLE_WRITE_ACTIONS: &[&str] = &[
    "dynamodb:BatchWriteItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
];
const IMAGE_PULL_ACTIONS: &[&str] = &[
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];
const IMAGE_PUSH_ACTIONS: &[&str] = &[
    "ecr:PutImage",
    "ecr:InitiateLayerUpload",
    "ecr:UploadLayerPart",
    "ecr:CompleteLayerUpload",
];
const CODECOMMIT_READ_ACTIONS: &[&str] = &[
    "codecommit:GitPull",
    "codecommit:EvaluatePullRequestApprovalRules",
    "codecommit:Get*",
    "codecommit:Describe*",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    pub action: Vec<String>,
    pub resource: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            effect: Effect::Allow,
            action: actions.iter().map(|a| a.to_string()).collect(),
            resource: resources,
            condition: None,
        }
    }

    /// Allow on every resource (`*`)
    pub fn allow_all(actions: &[&str]) -> Self {
        Self::allow(actions, vec![json!("*")])
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.action.iter().any(|a| a == action)
    }
}

pub fn policy_document(statements: &[PolicyStatement]) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": statements,
    })
}

/// Trust policy letting an AWS service assume a role
pub fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole",
        }],
    })
}

/// `AWS::IAM::Role` assumable by `service`
pub fn role(service: &str, role_name: Option<&str>, managed_policy_arns: Vec<Value>) -> Resource {
    let mut properties = json!({
        "AssumeRolePolicyDocument": assume_role_policy(service),
    });
    if let Some(name) = role_name {
        properties["RoleName"] = json!(name);
    }
    if !managed_policy_arns.is_empty() {
        properties["ManagedPolicyArns"] = json!(managed_policy_arns);
    }
    Resource::new("AWS::IAM::Role", properties)
}

/// `AWS::IAM::Policy` attached to the role with logical id `role_id`
pub fn role_policy(policy_name: &str, role_id: &str, statements: &[PolicyStatement]) -> Resource {
    Resource::new(
        "AWS::IAM::Policy",
        json!({
            "PolicyName": policy_name,
            "PolicyDocument": policy_document(statements),
            "Roles": [reference(role_id)],
        }),
    )
}

/// Permission sets that can be granted on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Read,
    ReadWrite,
    PullPush,
    FullAccess,
}

impl Grant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grant::Read => "read",
            Grant::ReadWrite => "read-write",
            Grant::PullPush => "pull-push",
            Grant::FullAccess => "full-access",
        }
    }

    /// Statements giving this permission set on `target`.
    pub fn statements(self, target: &GrantTarget) -> Result<Vec<PolicyStatement>> {
        let statements = match (self, target) {
            (Grant::Read, GrantTarget::Bucket(arn)) => {
                vec![PolicyStatement::allow(BUCKET_READ_ACTIONS, bucket_resources(arn))]
            }
            (Grant::ReadWrite, GrantTarget::Bucket(arn)) => vec![PolicyStatement::allow(
                &concat(&[BUCKET_READ_ACTIONS, BUCKET_WRITE_ACTIONS]),
                bucket_resources(arn),
            )],
            (Grant::Read, GrantTarget::Table(arn)) => {
                vec![PolicyStatement::allow(TABLE_READ_ACTIONS, vec![arn.clone()])]
            }
            (Grant::ReadWrite, GrantTarget::Table(arn)) => vec![PolicyStatement::allow(
                &concat(&[TABLE_READ_ACTIONS, TABLE_WRITE_ACTIONS]),
                vec![arn.clone()],
            )],
            (Grant::FullAccess, GrantTarget::Table(arn)) => {
                vec![PolicyStatement::allow(&["dynamodb:*"], vec![arn.clone()])]
            }
            (Grant::Read, GrantTarget::Repository(arn)) => vec![
                PolicyStatement::allow(IMAGE_PULL_ACTIONS, vec![arn.clone()]),
                PolicyStatement::allow_all(&["ecr:GetAuthorizationToken"]),
            ],
            (Grant::PullPush, GrantTarget::Repository(arn)) => vec![
                PolicyStatement::allow(
                    &concat(&[IMAGE_PULL_ACTIONS, IMAGE_PUSH_ACTIONS]),
                    vec![arn.clone()],
                ),
                PolicyStatement::allow_all(&["ecr:GetAuthorizationToken"]),
            ],
            (Grant::Read, GrantTarget::CodeRepository(arn)) => {
                vec![PolicyStatement::allow(CODECOMMIT_READ_ACTIONS, vec![arn.clone()])]
            }
            (Grant::ReadWrite, GrantTarget::CodeRepository(arn)) => vec![PolicyStatement::allow(
                &concat(&[CODECOMMIT_READ_ACTIONS, &["codecommit:GitPush"]]),
                vec![arn.clone()],
            )],
            (grant, target) => {
                return Err(InfraError::UnsupportedGrant {
                    grant: grant.as_str(),
                    target: target.kind(),
                })
            }
        };
        Ok(statements)
    }
}

/// A resource that permissions can be granted on, identified by its ARN
#[derive(Debug, Clone)]
pub enum GrantTarget {
    Bucket(Value),
    Table(Value),
    Repository(Value),
    CodeRepository(Value),
}

impl GrantTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            GrantTarget::Bucket(_) => "bucket",
            GrantTarget::Table(_) => "table",
            GrantTarget::Repository(_) => "image repository",
            GrantTarget::CodeRepository(_) => "code repository",
        }
    }
}

fn bucket_resources(arn: &Value) -> Vec<Value> {
    vec![arn.clone(), arn_with_suffix(arn.clone(), "/*")]
}

fn concat<'a>(groups: &[&[&'a str]]) -> Vec<&'a str> {
    groups.iter().flat_map(|g| g.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsics::get_att;

    #[test]
    fn test_bucket_read_covers_bucket_and_objects() {
        let arn = get_att("Bucket", "Arn");
        let statements = Grant::Read.statements(&GrantTarget::Bucket(arn.clone())).unwrap();

        assert_eq!(statements.len(), 1);
        assert!(statements[0].has_action("s3:GetObject*"));
        assert!(!statements[0].has_action("s3:PutObject"));
        assert_eq!(statements[0].resource[0], arn);
        assert_eq!(
            statements[0].resource[1],
            json!({ "Fn::Join": ["", [arn, "/*"]] })
        );
    }

    #[test]
    fn test_table_full_access_is_scoped_to_table() {
        let arn = get_att("Table", "Arn");
        let statements = Grant::FullAccess
            .statements(&GrantTarget::Table(arn.clone()))
            .unwrap();

        assert_eq!(statements[0].action, vec!["dynamodb:*".to_string()]);
        assert_eq!(statements[0].resource, vec![arn]);
    }

    #[test]
    fn test_pull_push_includes_authorization_token() {
        let statements = Grant::PullPush
            .statements(&GrantTarget::Repository(json!("arn:aws:ecr:::repo")))
            .unwrap();

        assert_eq!(statements.len(), 2);
        assert!(statements[0].has_action("ecr:PutImage"));
        assert!(statements[0].has_action("ecr:BatchGetImage"));
        assert!(statements[1].has_action("ecr:GetAuthorizationToken"));
        assert_eq!(statements[1].resource, vec![json!("*")]);
    }

    #[test]
    fn test_unsupported_combination_is_rejected() {
        let err = Grant::PullPush
            .statements(&GrantTarget::Bucket(json!("arn:aws:s3:::b")))
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot grant pull-push on bucket");
    }

    #[test]
    fn test_role_policy_serializes_statements() {
        let statement = PolicyStatement::allow_all(&["logs:PutLogEvents"]);
        let policy = role_policy("Default", "Role", &[statement]);

        let doc = &policy.properties["PolicyDocument"];
        assert_eq!(doc["Statement"][0]["Effect"], "Allow");
        assert_eq!(doc["Statement"][0]["Action"], json!(["logs:PutLogEvents"]));
        assert_eq!(policy.properties["Roles"], json!([{ "Ref": "Role" }]));
    }
}
