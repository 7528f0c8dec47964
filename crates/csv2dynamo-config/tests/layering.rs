use csv2dynamo_config::{EnvSource, LoaderConfig, LogFormat, ProvisioningContext, ENV_PREFIX};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Default)]
struct TestEnv(HashMap<String, String>);

impl TestEnv {
    fn set(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvSource for TestEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[test]
fn function_environment_on_lambda() {
    let env = TestEnv::default()
        .set("AWS_LAMBDA_FUNCTION_NAME", "from-s3-to-dynamodb")
        .set("LOG_LEVEL", "INFO")
        .set("TABLE_NAME", "people")
        .set("PARTITION_KEY_NAME", "id");

    let config = LoaderConfig::load_with_env(&env).unwrap();

    assert_eq!(config.table_name, "people");
    assert_eq!(config.partition_key_name.as_deref(), Some("id"));
    assert_eq!(config.filter_directive(), "info");
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.scratch_dir, PathBuf::from("/tmp"));
    assert_eq!(config.batch_size, 25);
}

#[test]
fn inline_file_is_overridden_by_environment() {
    let env = TestEnv::default()
        .set(
            "CSV2DYNAMO_CONFIG_CONTENT",
            "[loader]\ntable_name = \"from-file\"\nbatch_size = 10\n",
        )
        .set("CSV2DYNAMO_BATCH_SIZE", "5");

    let config = LoaderConfig::load_with_env(&env).unwrap();

    assert_eq!(config.table_name, "from-file");
    assert_eq!(config.batch_size, 5);
}

#[test]
fn missing_table_fails_validation_but_resolves() {
    let env = TestEnv::default();

    assert!(LoaderConfig::load_with_env(&env).is_err());

    let mut config = LoaderConfig::resolve_with_env(&env).unwrap();
    config.table_name = "people".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn context_from_cdk_json_with_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cdk.json");
    std::fs::write(
        &path,
        r#"{
            "app": "csv2dynamo synth",
            "context": {
                "namespace": "demo",
                "application": { "image-name": "express-app", "image-tag": "latest", "branch": "main" },
                "dynamodb": { "TABLE_NAME": "people", "PARTITION_KEY_NAME": "id" }
            }
        }"#,
    )
    .unwrap();
    let env = TestEnv::default().set("CSV2DYNAMO_BRANCH", "release");

    let context = ProvisioningContext::load_from_path_with_env(&path, &env).unwrap();

    assert_eq!(context.namespace, "demo");
    assert_eq!(context.application.image_name, "express-app");
    assert_eq!(context.application.branch, "release");
    assert_eq!(context.dynamodb.partition_key_name, "id");
}

#[test]
fn invalid_context_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("csv2dynamo.toml");
    std::fs::write(
        &path,
        r#"
[context]
namespace = "Not Valid"

[context.application]
image_name = "express-app"
image_tag = "latest"
branch = "main"

[context.dynamodb]
table_name = "people"
partition_key_name = "id"
"#,
    )
    .unwrap();

    let err = ProvisioningContext::load_from_path_with_env(&path, &TestEnv::default()).unwrap_err();
    assert!(format!("{:#}", err).contains("namespace"));
}
