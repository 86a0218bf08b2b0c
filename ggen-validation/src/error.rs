//! Validation layer errors
//!
//! SHACL violations are data, never errors; this type covers the pipeline
//! machinery itself.

use ggen_graph::GraphError;
use thiserror::Error;

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors raised by the validation pipeline
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Shapes graph could not be compiled
    #[error("Invalid shapes graph: {message}")]
    InvalidShapes { message: String },

    /// Rule registration rejected
    #[error("Rule registration rejected for '{id}': {message}")]
    RuleRejected { id: String, message: String },

    /// A rule implementation failed while executing
    #[error("Rule '{id}' failed: {message}")]
    RuleFailed { id: String, message: String },

    /// Subclass hierarchy contains a cycle
    #[error("Cycle in rdfs:subClassOf hierarchy at {class}")]
    OwlCycle { class: String },

    /// Functional property carries multiple distinct values
    #[error("Functional property {property} has {count} distinct values on {subject}")]
    FunctionalPropertyViolation {
        subject: String,
        property: String,
        count: usize,
    },

    /// Per-call deadline exceeded
    #[error("Validation exceeded deadline of {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    /// Cooperative cancellation observed between shape evaluations
    #[error("Validation cancelled")]
    Cancelled,
}

impl ValidationError {
    /// Stable error kind identifier
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Graph(e) => e.kind(),
            ValidationError::InvalidShapes { .. } => "shape-violation",
            ValidationError::RuleRejected { .. } => "custom-rule-failed",
            ValidationError::RuleFailed { .. } => "custom-rule-failed",
            ValidationError::OwlCycle { .. } => "owl-cycle",
            ValidationError::FunctionalPropertyViolation { .. } => {
                "functional-property-violation"
            }
            ValidationError::Timeout { .. } => "timeout",
            ValidationError::Cancelled => "cancelled",
        }
    }
}
