//! CloudFormation intrinsic functions and pseudo parameters.

use serde_json::{json, Value};

pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const REGION: &str = "AWS::Region";
pub const PARTITION: &str = "AWS::Partition";
pub const URL_SUFFIX: &str = "AWS::URLSuffix";

pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

pub fn import_value(export_name: &str) -> Value {
    json!({ "Fn::ImportValue": export_name })
}

pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index, list] })
}

/// Availability zones of the stack's region
pub fn get_azs() -> Value {
    json!({ "Fn::GetAZs": "" })
}

pub fn cidr(ip_block: Value, count: usize, cidr_bits: u8) -> Value {
    json!({ "Fn::Cidr": [ip_block, count, cidr_bits] })
}

/// Append a literal suffix (such as `/*`) to an ARN value.
pub fn arn_with_suffix(arn: Value, suffix: &str) -> Value {
    join("", vec![arn, Value::String(suffix.to_string())])
}
