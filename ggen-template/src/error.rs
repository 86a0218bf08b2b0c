//! Template layer errors

use thiserror::Error;

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors raised by frontmatter processing and rendering
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Frontmatter header could not be parsed
    #[error("Invalid frontmatter in {template}: {message}")]
    Frontmatter { template: String, message: String },

    /// A directive outside the recognized set (strict mode)
    #[error("Unknown frontmatter directive '{name}' in {template}")]
    UnknownDirective { name: String, template: String },

    /// More than one write policy, or anchors without inject, or lineAt < 1
    #[error("Conflicting frontmatter directives in {template}: {message}")]
    ConflictingDirectives { template: String, message: String },

    /// Strict-mode missing variable
    #[error("Undefined variable '{name}' while rendering {template}")]
    UndefinedVariable { name: String, template: String },

    /// Host-dependent filter or function rejected at parse time
    #[error("Forbidden non-deterministic filter or function '{name}' in {template}")]
    ForbiddenFilter { name: String, template: String },

    /// Any other rendering failure
    #[error("Render error in {template}: {message}")]
    Render {
        message: String,
        template: String,
        line: Option<u32>,
    },

    /// Context nesting exceeded the fixed bound
    #[error("Context exceeds maximum nesting depth {max_depth}; refusing possibly cyclic value")]
    CycleInContext { max_depth: usize },
}

impl TemplateError {
    /// Stable error kind identifier
    pub fn kind(&self) -> &'static str {
        match self {
            TemplateError::Frontmatter { .. } => "frontmatter-error",
            TemplateError::UnknownDirective { .. } => "frontmatter-error",
            TemplateError::ConflictingDirectives { .. } => "conflicting-directives",
            TemplateError::UndefinedVariable { .. } => "undefined-variable",
            TemplateError::ForbiddenFilter { .. } => "forbidden-filter",
            TemplateError::Render { .. } => "render-error",
            TemplateError::CycleInContext { .. } => "cycle-in-context",
        }
    }
}
