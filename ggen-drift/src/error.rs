//! Drift layer errors

use ggen_artifact::ArtifactError;
use ggen_graph::GraphError;
use thiserror::Error;

/// Result type for drift operations
pub type DriftResult<T> = std::result::Result<T, DriftError>;

/// Errors raised by detection, the baseline store and fix mode
#[derive(Debug, Error)]
pub enum DriftError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Baseline file {path} is corrupt: {message}")]
    BaselineCorrupt { path: String, message: String },

    #[error("No expected state for {path}: no parameter, attestation or baseline entry")]
    NoExpectedState { path: String },

    #[error("Cannot regenerate {path}: attestation lacks provenance and no baseline content is stored")]
    RegenerationUnavailable { path: String },

    #[error("Unauthorized modification of {path}: drift in fail mode")]
    UnauthorizedModification { path: String },

    #[error("Write failed for {path}: {message}")]
    WriteFailed { path: String, message: String },
}

impl DriftError {
    /// Stable error kind identifier
    pub fn kind(&self) -> &'static str {
        match self {
            DriftError::Graph(e) => e.kind(),
            DriftError::Artifact(e) => e.kind(),
            DriftError::BaselineCorrupt { .. } => "baseline-corrupt",
            DriftError::NoExpectedState { .. } => "no-attestation",
            DriftError::RegenerationUnavailable { .. } => "regeneration-unavailable",
            DriftError::UnauthorizedModification { .. } => "unauthorized-modification",
            DriftError::WriteFailed { .. } => "write-failed",
        }
    }
}
