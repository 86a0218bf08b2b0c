// ggen-graph: RDF triple-set store and parsers
// Wraps oxigraph for format support; keeps triples in a sorted set so that
// enumeration, diffing and hashing are deterministic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod diff;
pub mod error;
pub mod graph;
pub mod parser;
pub mod serializer;
pub mod term;
pub mod triple;
pub mod vocab;

pub use diff::GraphDiff;
pub use error::{GraphError, GraphResult};
pub use graph::Graph;
pub use parser::GraphFormat;
pub use term::Term;
pub use triple::Triple;
