//! A stack: one CloudFormation template plus its cross-stack wiring.
//!
//! Values flow between stacks through exports. A stack publishes a value with
//! [`Stack::export`]; a later stack consumes it with [`Stack::import`], which
//! records the dependency used to order deployment.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::{InfraError, Result};
use crate::iam::{role_policy, Grant, GrantTarget, PolicyStatement};
use crate::intrinsics::{import_value, reference};
use crate::template::{Export, Output, Parameter, Resource, Template};

#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    template: Template,
    /// Output key -> export name
    exports: BTreeMap<String, String>,
    dependencies: BTreeSet<String>,
}

impl Stack {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: Template::new(description),
            exports: BTreeMap::new(),
            dependencies: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }

    pub fn add_dependency(&mut self, stack: &str) {
        self.dependencies.insert(stack.to_string());
    }

    pub fn add_parameter(&mut self, name: &str, parameter: Parameter) -> Value {
        self.template.parameters.insert(name.to_string(), parameter);
        reference(name)
    }

    /// Add a resource and return a `Ref` to it.
    pub fn add_resource(&mut self, logical_id: &str, resource: Resource) -> Result<Value> {
        if self.template.resources.contains_key(logical_id) {
            return Err(InfraError::DuplicateResource {
                stack: self.name.clone(),
                logical_id: logical_id.to_string(),
            });
        }
        debug!(stack = %self.name, logical_id, kind = %resource.kind, "Adding resource");
        self.template
            .resources
            .insert(logical_id.to_string(), resource);
        Ok(reference(logical_id))
    }

    pub fn add_output(&mut self, name: &str, value: Value, description: Option<&str>) -> Result<()> {
        self.insert_output(name, value, description, None)
    }

    /// Publish a value for other stacks under the export name `{stack}:{key}`.
    pub fn export(&mut self, key: &str, value: Value, description: Option<&str>) -> Result<()> {
        let export_name = format!("{}:{}", self.name, key);
        self.insert_output(key, value, description, Some(export_name.clone()))?;
        self.exports.insert(key.to_string(), export_name);
        Ok(())
    }

    fn insert_output(
        &mut self,
        name: &str,
        value: Value,
        description: Option<&str>,
        export_name: Option<String>,
    ) -> Result<()> {
        if self.template.outputs.contains_key(name) {
            return Err(InfraError::DuplicateOutput {
                stack: self.name.clone(),
                name: name.to_string(),
            });
        }
        self.template.outputs.insert(
            name.to_string(),
            Output {
                description: description.map(str::to_string),
                value,
                export: export_name.map(|name| Export { name }),
            },
        );
        Ok(())
    }

    /// Handle on everything this stack exports.
    pub fn outputs(&self) -> StackOutputs {
        StackOutputs {
            stack: self.name.clone(),
            exports: self.exports.clone(),
        }
    }

    /// Reference a value exported by another stack, recording the dependency.
    pub fn import(&mut self, from: &StackOutputs, key: &str) -> Result<Value> {
        let export_name = from.export_name(key)?;
        self.dependencies.insert(from.stack.clone());
        Ok(import_value(export_name))
    }

    /// Append statements to the role's default policy, creating it on first use.
    pub fn add_to_role_policy(&mut self, role_id: &str, statements: Vec<PolicyStatement>) -> Result<()> {
        let policy_id = default_policy_id(role_id);
        match self.template.resources.get_mut(&policy_id) {
            Some(policy) => {
                let rendered = serde_json::to_value(&statements)?;
                if let (Some(existing), Value::Array(new)) = (
                    policy.properties["PolicyDocument"]["Statement"].as_array_mut(),
                    rendered,
                ) {
                    existing.extend(new);
                }
                Ok(())
            }
            None => {
                let policy = role_policy(&policy_id, role_id, &statements);
                self.add_resource(&policy_id, policy).map(|_| ())
            }
        }
    }

    pub fn grant(&mut self, role_id: &str, grant: Grant, target: &GrantTarget) -> Result<()> {
        let statements = grant.statements(target)?;
        debug!(
            stack = %self.name,
            role = role_id,
            grant = grant.as_str(),
            target = target.kind(),
            "Granting"
        );
        self.add_to_role_policy(role_id, statements)
    }

    pub fn grant_read(&mut self, role_id: &str, target: &GrantTarget) -> Result<()> {
        self.grant(role_id, Grant::Read, target)
    }

    pub fn grant_read_write(&mut self, role_id: &str, target: &GrantTarget) -> Result<()> {
        self.grant(role_id, Grant::ReadWrite, target)
    }

    pub fn grant_pull_push(&mut self, role_id: &str, target: &GrantTarget) -> Result<()> {
        self.grant(role_id, Grant::PullPush, target)
    }

    pub fn grant_full_access(&mut self, role_id: &str, target: &GrantTarget) -> Result<()> {
        self.grant(role_id, Grant::FullAccess, target)
    }

    /// Render the template as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.template)?)
    }
}

/// Logical id of the policy [`Stack::add_to_role_policy`] attaches to a role
pub fn default_policy_id(role_id: &str) -> String {
    format!("{}DefaultPolicy", role_id)
}

/// Exports of one stack, passed to the stacks that consume them
#[derive(Debug, Clone)]
pub struct StackOutputs {
    stack: String,
    exports: BTreeMap<String, String>,
}

impl StackOutputs {
    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn export_name(&self, key: &str) -> Result<&str> {
        self.exports
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| InfraError::UnknownOutput {
                stack: self.stack.clone(),
                key: key.to_string(),
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}
