use csv2dynamo_config::{ApplicationConfig, DynamoDbConfig, ProvisioningContext};
use csv2dynamo_infra::{template_file_name, App, Manifest, MANIFEST_FILE};
use serde_json::Value;

fn context() -> ProvisioningContext {
    ProvisioningContext {
        namespace: "shop".to_string(),
        application: ApplicationConfig {
            image_name: "web".to_string(),
            image_tag: "v1".to_string(),
            branch: "release".to_string(),
        },
        dynamodb: DynamoDbConfig {
            table_name: "orders".to_string(),
            partition_key_name: "order_id".to_string(),
        },
        loader_artifact: None,
    }
}

fn read_json(path: &std::path::Path) -> Value {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn synth_writes_templates_and_manifest() {
    let out = tempfile::tempdir().unwrap();
    let app = App::from_context(&context()).unwrap();

    let manifest = app.synth(out.path()).unwrap();

    let names: Vec<_> = manifest.stacks.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "s3-to-dynamodb",
            "shop-container-infra",
            "shop-pipeline-base",
            "shop-pipeline"
        ]
    );

    for entry in &manifest.stacks {
        assert_eq!(entry.template, template_file_name(&entry.name));
        let template = read_json(&out.path().join(&entry.template));
        assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(template["Resources"].as_object().unwrap().len() > 0);
    }

    let on_disk: Manifest =
        serde_json::from_str(&std::fs::read_to_string(out.path().join(MANIFEST_FILE)).unwrap())
            .unwrap();
    assert_eq!(on_disk, manifest);
}

#[test]
fn manifest_records_cross_stack_dependencies() {
    let out = tempfile::tempdir().unwrap();
    let manifest = App::from_context(&context())
        .unwrap()
        .synth(out.path())
        .unwrap();

    let entry = |name: &str| {
        manifest
            .stacks
            .iter()
            .find(|s| s.name == name)
            .unwrap()
            .clone()
    };
    assert!(entry("s3-to-dynamodb").dependencies.is_empty());
    assert!(entry("shop-container-infra").dependencies.is_empty());
    assert_eq!(
        entry("shop-pipeline-base").dependencies,
        vec!["shop-container-infra"]
    );
    assert_eq!(
        entry("shop-pipeline").dependencies,
        vec!["shop-container-infra", "shop-pipeline-base"]
    );
    assert!(entry("shop-container-infra")
        .exports
        .contains(&"ClusterArn".to_string()));
}

#[test]
fn every_import_resolves_to_an_upstream_export() {
    let out = tempfile::tempdir().unwrap();
    let manifest = App::from_context(&context())
        .unwrap()
        .synth(out.path())
        .unwrap();

    let mut exported = Vec::new();
    for entry in &manifest.stacks {
        let template = read_json(&out.path().join(&entry.template));
        let rendered = template.to_string();

        for import in find_imports(&template) {
            assert!(
                exported.contains(&import),
                "{} imports {} before it is exported",
                entry.name,
                import
            );
        }
        if let Some(outputs) = template["Outputs"].as_object() {
            for output in outputs.values() {
                if let Some(name) = output["Export"]["Name"].as_str() {
                    exported.push(name.to_string());
                }
            }
        }
        assert!(!rendered.contains("null"), "{} renders a null", entry.name);
    }
}

#[test]
fn loader_function_is_wired_to_table_from_context() {
    let out = tempfile::tempdir().unwrap();
    App::from_context(&context())
        .unwrap()
        .synth(out.path())
        .unwrap();

    let template = read_json(&out.path().join("s3-to-dynamodb.template.json"));
    let resources = &template["Resources"];
    let table = &resources["FromS3ToDynamoDBTable"]["Properties"];
    assert_eq!(table["TableName"], "orders");
    assert_eq!(table["KeySchema"][0]["AttributeName"], "order_id");

    let env = &resources["FromS3ToDynamoDBFunction"]["Properties"]["Environment"]["Variables"];
    assert_eq!(env["PARTITION_KEY_NAME"], "order_id");
    assert!(template["Parameters"]["LoaderCodeBucket"].get("Default").is_none());
}

fn find_imports(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("Fn::ImportValue") {
                found.push(name.clone());
            }
            for child in map.values() {
                found.extend(find_imports(child));
            }
        }
        Value::Array(items) => {
            for item in items {
                found.extend(find_imports(item));
            }
        }
        _ => {}
    }
    found
}
