//! Triples
//!
//! `(subject, predicate, object, graph?)` facts. The derived ordering is the
//! canonical enumeration order for every graph in the engine.

use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single RDF statement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Subject: IRI or blank node
    pub subject: Term,
    /// Predicate IRI (always a named node, stored without brackets)
    pub predicate: String,
    /// Object: IRI, blank node or literal
    pub object: Term,
    /// Optional named-graph IRI
    pub graph: Option<String>,
}

impl Triple {
    /// Triple in the default graph
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
            graph: None,
        }
    }

    /// Triple in a named graph
    pub fn new_in_graph(
        subject: Term,
        predicate: impl Into<String>,
        object: Term,
        graph: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
            graph: Some(graph.into()),
        }
    }

    /// True when subject or object is a blank node
    pub fn has_blank_node(&self) -> bool {
        self.subject.is_blank() || self.object.is_blank()
    }

    /// N-Quads-style line for this triple: `subject SP predicate SP object`
    /// with the graph IRI appended when present.
    pub fn to_nquads_line(&self) -> String {
        match &self.graph {
            Some(graph) => format!(
                "{} <{}> {} <{}>",
                self.subject.to_nquads(),
                self.predicate,
                self.object.to_nquads(),
                graph
            ),
            None => format!(
                "{} <{}> {}",
                self.subject.to_nquads(),
                self.predicate,
                self.object.to_nquads()
            ),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_nquads_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Term {
        Term::Iri(s.to_string())
    }

    #[test]
    fn test_nquads_line_default_graph() {
        let t = Triple::new(
            iri("http://example.org/john"),
            "http://xmlns.com/foaf/0.1/name",
            Term::string_literal("John"),
        );
        assert_eq!(
            t.to_nquads_line(),
            "<http://example.org/john> <http://xmlns.com/foaf/0.1/name> \"John\""
        );
    }

    #[test]
    fn test_nquads_line_named_graph() {
        let t = Triple::new_in_graph(
            iri("http://example.org/s"),
            "http://example.org/p",
            iri("http://example.org/o"),
            "http://example.org/g",
        );
        assert!(t.to_nquads_line().ends_with("<http://example.org/g>"));
    }

    #[test]
    fn test_ordering_by_subject_first() {
        let a = Triple::new(
            iri("http://example.org/a"),
            "http://example.org/p",
            iri("http://example.org/o"),
        );
        let b = Triple::new(
            iri("http://example.org/b"),
            "http://example.org/p",
            iri("http://example.org/o"),
        );
        assert!(a < b);
    }

    #[test]
    fn test_has_blank_node() {
        let t = Triple::new(
            Term::Blank("b0".to_string()),
            "http://example.org/p",
            Term::string_literal("x"),
        );
        assert!(t.has_blank_node());
    }
}
