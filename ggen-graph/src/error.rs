//! Graph layer errors

use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by parsing, serialization and hashing of RDF graphs
#[derive(Debug, Error)]
pub enum GraphError {
    /// Malformed input document. Carries the underlying parser message,
    /// which includes line/column when the format parser provides them.
    #[error("Failed to parse {format} from {source_name}: {message}")]
    Parse {
        format: String,
        source_name: String,
        message: String,
    },

    /// Serialization to the requested format failed
    #[error("Failed to serialize graph as {format}: {message}")]
    Serialize { format: String, message: String },

    /// Backing store operation failed
    #[error("RDF store error: {0}")]
    Store(String),

    /// A term could not be converted to the oxigraph model
    #[error("Invalid term: {0}")]
    InvalidTerm(String),

    /// Labelled-lexical hashing refused: too many blank nodes
    #[error("Graph has {count} blank nodes (threshold {threshold}); labelled-lexical hash would be unstable")]
    BlankNodeHeavy { count: usize, threshold: usize },

    /// Unknown format name or extension
    #[error("Unknown RDF format: {0}")]
    UnknownFormat(String),
}

impl GraphError {
    /// Stable error kind identifier.
    ///
    /// The closed input-error taxonomy has no finer entry than
    /// `parse-error`, so unsupported formats, store failures and
    /// blank-node-heavy refusals all collapse onto it. Callers that branch
    /// on `kind()` must not read `parse-error` as specifically "malformed
    /// RDF syntax"; match on the variant when the distinction matters.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::Parse { .. } => "parse-error",
            GraphError::Serialize { .. } => "parse-error",
            GraphError::Store(_) => "parse-error",
            GraphError::InvalidTerm(_) => "parse-error",
            GraphError::BlankNodeHeavy { .. } => "parse-error",
            GraphError::UnknownFormat(_) => "parse-error",
        }
    }
}
