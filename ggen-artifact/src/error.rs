//! Artifact layer errors

use ggen_graph::GraphError;
use ggen_template::TemplateError;
use thiserror::Error;

/// Result type for artifact operations
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Errors raised by generation, attestation and the plan driver
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Write failed for {path}: {message}")]
    WriteFailed { path: String, message: String },

    #[error("No attestation found beside {path}")]
    NoAttestation { path: String },

    #[error("Attestation beside {path} is corrupt: {message}")]
    AttestationCorrupt { path: String, message: String },

    #[error("Output path escapes the output root: {path}")]
    PathEscape { path: String },

    #[error("Injection anchor '{anchor}' not found in {path}")]
    AnchorNotFound { anchor: String, path: String },

    #[error("Template has no output path: pass one explicitly or set 'to' in frontmatter ({template})")]
    MissingOutputPath { template: String },

    /// A lockfile entry did not reproduce its recorded hash
    #[error("Reproducibility failure for entry '{entry}': expected {expected}, got {actual}")]
    Reproducibility {
        entry: String,
        expected: String,
        actual: String,
    },

    #[error("Lockfile is corrupt: {message}")]
    LockfileCorrupt { message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl ArtifactError {
    /// Stable error kind identifier
    pub fn kind(&self) -> &'static str {
        match self {
            ArtifactError::Template(e) => e.kind(),
            ArtifactError::Graph(e) => e.kind(),
            ArtifactError::FileNotFound { .. } => "file-not-found",
            ArtifactError::WriteFailed { .. } => "write-failed",
            ArtifactError::NoAttestation { .. } => "no-attestation",
            ArtifactError::AttestationCorrupt { .. } => "no-attestation",
            ArtifactError::PathEscape { .. } => "path-escape",
            ArtifactError::AnchorNotFound { .. } => "write-failed",
            ArtifactError::MissingOutputPath { .. } => "frontmatter-error",
            ArtifactError::Reproducibility { .. } => "unauthorized-modification",
            ArtifactError::LockfileCorrupt { .. } => "baseline-corrupt",
            ArtifactError::Cancelled => "cancelled",
        }
    }
}
