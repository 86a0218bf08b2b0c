//! Triple-set diffing
//!
//! The drift detector classifies byte-level differences as cosmetic or
//! semantic by comparing the triple sets of the two documents.

use crate::graph::Graph;
use crate::triple::Triple;
use std::collections::BTreeSet;

/// Result of comparing two graphs
#[derive(Debug, Clone, Default)]
pub struct GraphDiff {
    /// Triples present in `current` but not in `base`
    pub added: BTreeSet<Triple>,
    /// Triples present in `base` but not in `current`
    pub removed: BTreeSet<Triple>,
    /// Triples present in both
    pub common: BTreeSet<Triple>,
}

impl GraphDiff {
    /// Compare two graphs as triple sets
    pub fn compute(base: &Graph, current: &Graph) -> GraphDiff {
        let base_set = base.triples();
        let current_set = current.triples();

        GraphDiff {
            added: current_set.difference(base_set).cloned().collect(),
            removed: base_set.difference(current_set).cloned().collect(),
            common: base_set.intersection(current_set).cloned().collect(),
        }
    }

    /// True when the two graphs contain exactly the same triples
    pub fn is_identical(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed triples
    pub fn changed_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GraphFormat;
    use crate::term::Term;
    use crate::vocab;

    #[test]
    fn test_identical_graphs() {
        let a = Graph::from_triples(
            "<a>",
            [Triple::new(
                Term::Iri("http://example.org/s".into()),
                "http://example.org/p",
                Term::string_literal("v"),
            )],
        );
        let diff = GraphDiff::compute(&a, &a.clone());
        assert!(diff.is_identical());
        assert_eq!(diff.common.len(), 1);
    }

    #[test]
    fn test_reformatted_turtle_is_identical() {
        // Same triple set, different prefix order and whitespace
        let one = r#"
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://example.org/> .
ex:john a foaf:Person ; foaf:name "John" .
"#;
        let two = r#"
@prefix ex: <http://example.org/> .
@prefix foaf: <http://xmlns.com/foaf/0.1/> .

ex:john foaf:name "John" .
ex:john a foaf:Person .
"#;
        let a = Graph::parse(one.as_bytes(), GraphFormat::Turtle, "<one>").unwrap();
        let b = Graph::parse(two.as_bytes(), GraphFormat::Turtle, "<two>").unwrap();
        let diff = GraphDiff::compute(&a, &b);
        assert!(diff.is_identical());
    }

    #[test]
    fn test_added_type_triple() {
        let base = Graph::from_triples(
            "<base>",
            [Triple::new(
                Term::Iri("http://example.org/s".into()),
                "http://example.org/p",
                Term::string_literal("v"),
            )],
        );
        let mut current = base.clone();
        current.merge(&Graph::from_triples(
            "<extra>",
            [Triple::new(
                Term::Iri("http://example.org/s".into()),
                vocab::RDF_TYPE,
                Term::Iri("http://example.org/Thing".into()),
            )],
        ));
        let diff = GraphDiff::compute(&base, &current);
        assert_eq!(diff.added.len(), 1);
        assert!(diff.removed.is_empty());
        assert_eq!(diff.changed_count(), 1);
    }
}
