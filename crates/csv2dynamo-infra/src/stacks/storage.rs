//! `s3-to-dynamodb`: the upload bucket, the loader function and its table.

use csv2dynamo_config::ProvisioningContext;
use serde_json::json;

use super::{private_bucket_properties, STORAGE_STACK};
use crate::error::Result;
use crate::iam::{role, GrantTarget};
use crate::intrinsics::{get_att, reference, sub, ACCOUNT_ID};
use crate::stack::{default_policy_id, Stack};
use crate::template::{Parameter, RemovalPolicy, Resource};

pub const FUNCTION_NAME: &str = "from-s3-to-dynamodb";
pub const BUCKET_NAME: &str = "s3-to-dynamo-db-workshop";
/// Suffix an uploaded key needs to trigger the loader
pub const TRIGGER_SUFFIX: &str = ".csv";
const LOG_RETENTION_DAYS: u32 = 731;

pub const FUNCTION_ID: &str = "FromS3ToDynamoDBFunction";
pub const ROLE_ID: &str = "FromS3ToDynamoDBFunctionServiceRole";
pub const LOG_GROUP_ID: &str = "FromS3ToDynamoDBLogGroup";
pub const BUCKET_ID: &str = "S3ToDynamoDBBucket";
pub const PERMISSION_ID: &str = "S3ToDynamoDBBucketInvokePermission";
pub const TABLE_ID: &str = "FromS3ToDynamoDBTable";
pub const CODE_BUCKET_PARAMETER: &str = "LoaderCodeBucket";
pub const CODE_KEY_PARAMETER: &str = "LoaderCodeKey";

pub fn storage_stack(context: &ProvisioningContext) -> Result<Stack> {
    let mut stack = Stack::new(
        STORAGE_STACK,
        "CSV uploads bucket, loader function and destination table",
    );
    let table = &context.dynamodb;
    let artifact = context.loader_artifact.as_ref();

    let code_bucket = stack.add_parameter(
        CODE_BUCKET_PARAMETER,
        Parameter::string(
            "Bucket holding the packaged loader (bootstrap zip)",
            artifact.map(|a| a.bucket.clone()),
        ),
    );
    let code_key = stack.add_parameter(
        CODE_KEY_PARAMETER,
        Parameter::string(
            "Object key of the packaged loader",
            artifact.map(|a| a.key.clone()),
        ),
    );

    stack.add_resource(
        ROLE_ID,
        role(
            "lambda.amazonaws.com",
            None,
            vec![sub(
                "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole",
            )],
        ),
    )?;

    let table_ref = stack.add_resource(
        TABLE_ID,
        Resource::new(
            "AWS::DynamoDB::Table",
            json!({
                "TableName": table.table_name,
                "BillingMode": "PAY_PER_REQUEST",
                "AttributeDefinitions": [
                    { "AttributeName": table.partition_key_name, "AttributeType": "S" }
                ],
                "KeySchema": [
                    { "AttributeName": table.partition_key_name, "KeyType": "HASH" }
                ],
            }),
        )
        .removal_policy(RemovalPolicy::Retain),
    )?;

    // The bucket name is fixed, so its ARN is built rather than read back
    // from the bucket; the bucket itself waits on the invoke permission.
    let bucket_arn = sub(&format!("arn:${{AWS::Partition}}:s3:::{}", BUCKET_NAME));

    stack.grant_read(ROLE_ID, &GrantTarget::Bucket(bucket_arn.clone()))?;
    stack.grant_full_access(ROLE_ID, &GrantTarget::Table(get_att(TABLE_ID, "Arn")))?;

    stack.add_resource(
        FUNCTION_ID,
        Resource::new(
            "AWS::Lambda::Function",
            json!({
                "FunctionName": FUNCTION_NAME,
                "Code": { "S3Bucket": code_bucket, "S3Key": code_key },
                "Role": get_att(ROLE_ID, "Arn"),
                "Runtime": "provided.al2023",
                "Handler": "bootstrap",
                "Architectures": ["arm64"],
                "Timeout": 3,
                "ReservedConcurrentExecutions": 1,
                "Environment": {
                    "Variables": {
                        "LOG_LEVEL": "INFO",
                        "TABLE_NAME": table_ref,
                        "PARTITION_KEY_NAME": table.partition_key_name,
                    }
                },
            }),
        )
        .depends_on(ROLE_ID)
        .depends_on(&default_policy_id(ROLE_ID)),
    )?;

    stack.add_resource(
        LOG_GROUP_ID,
        Resource::new(
            "AWS::Logs::LogGroup",
            json!({
                "LogGroupName": format!("/aws/lambda/{}", FUNCTION_NAME),
                "RetentionInDays": LOG_RETENTION_DAYS,
            }),
        )
        .removal_policy(RemovalPolicy::Delete),
    )?;

    stack.add_resource(
        PERMISSION_ID,
        Resource::new(
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": get_att(FUNCTION_ID, "Arn"),
                "Principal": "s3.amazonaws.com",
                "SourceAccount": reference(ACCOUNT_ID),
                "SourceArn": bucket_arn,
            }),
        ),
    )?;

    let mut bucket = private_bucket_properties(json!(BUCKET_NAME));
    bucket["NotificationConfiguration"] = json!({
        "LambdaConfigurations": [{
            "Event": "s3:ObjectCreated:*",
            "Filter": {
                "S3Key": { "Rules": [{ "Name": "suffix", "Value": TRIGGER_SUFFIX }] }
            },
            "Function": get_att(FUNCTION_ID, "Arn"),
        }]
    });
    let bucket_ref = stack.add_resource(
        BUCKET_ID,
        Resource::new("AWS::S3::Bucket", bucket)
            .depends_on(PERMISSION_ID)
            .removal_policy(RemovalPolicy::Retain),
    )?;

    stack.add_output("BucketName", bucket_ref, Some("Upload bucket for CSV files"))?;
    stack.add_output("TableName", table_ref, Some("Destination table"))?;
    stack.add_output(
        "FunctionArn",
        get_att(FUNCTION_ID, "Arn"),
        Some("Loader function"),
    )?;

    Ok(stack)
}
