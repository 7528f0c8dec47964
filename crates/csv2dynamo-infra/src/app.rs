//! App assembly: the stacks built from one provisioning context, their
//! deployment order and synthesis to disk.

use csv2dynamo_config::ProvisioningContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{InfraError, Result};
use crate::stack::Stack;
use crate::stacks::{container_infra_stack, pipeline_base_stack, pipeline_stack, storage_stack};

pub const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: u32 = 1;

/// Stacks in the order they were added
#[derive(Debug, Default)]
pub struct App {
    stacks: Vec<Stack>,
}

/// Written next to the templates; lists stacks in deployment order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub stacks: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub template: String,
    pub dependencies: Vec<String>,
    pub exports: Vec<String>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the four stacks, threading the container stack's exports into
    /// both pipeline stacks and the pipeline base exports into the pipeline.
    pub fn from_context(context: &ProvisioningContext) -> Result<Self> {
        let mut app = Self::new();
        app.add_stack(storage_stack(context)?)?;

        let container = container_infra_stack(context)?;
        let container_outputs = container.outputs();
        app.add_stack(container)?;

        let base = pipeline_base_stack(context, &container_outputs)?;
        let base_outputs = base.outputs();
        app.add_stack(base)?;

        app.add_stack(pipeline_stack(context, &container_outputs, &base_outputs)?)?;
        Ok(app)
    }

    pub fn add_stack(&mut self, stack: Stack) -> Result<()> {
        if self.stack(stack.name()).is_some() {
            return Err(InfraError::DuplicateStack(stack.name().to_string()));
        }
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Stacks ordered so each comes after everything it depends on.
    ///
    /// Ties keep insertion order.
    pub fn deployment_order(&self) -> Result<Vec<&Stack>> {
        for stack in &self.stacks {
            for dependency in stack.dependencies() {
                if self.stack(dependency).is_none() {
                    return Err(InfraError::UnknownDependency {
                        stack: stack.name().to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }

        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.stacks.len());
        while order.len() < self.stacks.len() {
            let next = self.stacks.iter().find(|stack| {
                !placed.contains(stack.name())
                    && stack.dependencies().all(|dep| placed.contains(dep))
            });
            match next {
                Some(stack) => {
                    placed.insert(stack.name());
                    order.push(stack);
                }
                None => {
                    let remaining = self
                        .stacks
                        .iter()
                        .filter(|s| !placed.contains(s.name()))
                        .map(|s| s.name().to_string())
                        .collect();
                    return Err(InfraError::DependencyCycle(remaining));
                }
            }
        }
        Ok(order)
    }

    /// Write one template per stack plus the manifest into `out_dir`.
    pub fn synth(&self, out_dir: &Path) -> Result<Manifest> {
        let order = self.deployment_order()?;
        std::fs::create_dir_all(out_dir).map_err(|source| InfraError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;

        let mut entries = Vec::with_capacity(order.len());
        for stack in order {
            let file_name = template_file_name(stack.name());
            let path = out_dir.join(&file_name);
            write_file(&path, &stack.to_json()?)?;
            info!(
                stack = stack.name(),
                resources = stack.template().resources.len(),
                "Synthesized {}",
                path.display()
            );
            entries.push(ManifestEntry {
                name: stack.name().to_string(),
                template: file_name,
                dependencies: stack.dependencies().map(str::to_string).collect(),
                exports: stack.outputs().keys().map(str::to_string).collect(),
            });
        }

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            stacks: entries,
        };
        let manifest_path = out_dir.join(MANIFEST_FILE);
        write_file(&manifest_path, &serde_json::to_string_pretty(&manifest)?)?;
        debug!("Wrote {}", manifest_path.display());
        Ok(manifest)
    }
}

pub fn template_file_name(stack: &str) -> String {
    format!("{}.template.json", stack)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|source| InfraError::Io {
        path: PathBuf::from(path),
        source,
    })
}
