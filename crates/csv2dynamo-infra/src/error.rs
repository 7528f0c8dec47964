//! Error types for resource graph construction and synthesis.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("stack '{stack}' already defines resource '{logical_id}'")]
    DuplicateResource { stack: String, logical_id: String },

    #[error("stack '{stack}' already defines output '{name}'")]
    DuplicateOutput { stack: String, name: String },

    #[error("app already contains a stack named '{0}'")]
    DuplicateStack(String),

    #[error("stack '{stack}' has no exported output '{key}'")]
    UnknownOutput { stack: String, key: String },

    #[error("stack '{stack}' depends on unknown stack '{dependency}'")]
    UnknownDependency { stack: String, dependency: String },

    #[error("stack dependencies form a cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("cannot grant {grant} on {target}")]
    UnsupportedGrant {
        grant: &'static str,
        target: &'static str,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render template: {0}")]
    Render(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InfraError>;
