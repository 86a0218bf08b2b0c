//! Engine-level errors

use crate::state::EngineState;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the orchestrator
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation attempted against a non-ready engine
    #[error("Engine is not ready (state: {state:?})")]
    NotReady { state: EngineState },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Template(#[from] ggen_template::TemplateError),

    #[error(transparent)]
    Graph(#[from] ggen_graph::GraphError),

    #[error(transparent)]
    Artifact(#[from] ggen_artifact::ArtifactError),

    #[error(transparent)]
    Validation(#[from] ggen_validation::ValidationError),

    #[error(transparent)]
    Drift(#[from] ggen_drift::DriftError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Stable error kind identifier
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotReady { .. } => "engine-not-ready",
            EngineError::Config { .. } => "parse-error",
            EngineError::Template(e) => e.kind(),
            EngineError::Graph(e) => e.kind(),
            EngineError::Artifact(e) => e.kind(),
            EngineError::Validation(e) => e.kind(),
            EngineError::Drift(e) => e.kind(),
            EngineError::Cancelled => "cancelled",
        }
    }
}
