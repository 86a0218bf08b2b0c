//! In-memory RDF graph
//!
//! An unordered set of triples with a source tag. Set semantics (no
//! duplicates), immutable after parsing except via explicit [`Graph::merge`].
//! Enumeration is always in canonical sorted order and restartable.

use crate::error::{GraphError, GraphResult};
use crate::term::Term;
use crate::triple::Triple;
use crate::vocab;
use std::collections::{BTreeMap, BTreeSet};

/// A triple set with a source tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
    /// Where the graph came from (file path or `"<string>"`)
    source: String,
}

impl Graph {
    /// Empty graph with a source tag
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            triples: BTreeSet::new(),
            source: source.into(),
        }
    }

    /// Build a graph from triples, deduplicating per set semantics
    pub fn from_triples(source: impl Into<String>, triples: impl IntoIterator<Item = Triple>) -> Self {
        Self {
            triples: triples.into_iter().collect(),
            source: source.into(),
        }
    }

    /// Source tag (file path or string marker)
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Sorted, restartable iteration over all triples
    pub fn iter(&self) -> impl Iterator<Item = &Triple> + '_ {
        self.triples.iter()
    }

    /// The underlying sorted set
    pub fn triples(&self) -> &BTreeSet<Triple> {
        &self.triples
    }

    /// Union with another graph. The only mutation the type allows.
    pub fn merge(&mut self, other: &Graph) {
        for triple in other.iter() {
            self.triples.insert(triple.clone());
        }
    }

    /// Insert a triple during construction
    pub(crate) fn insert(&mut self, triple: Triple) {
        self.triples.insert(triple);
    }

    /// Number of distinct blank-node labels in the graph
    pub fn blank_node_count(&self) -> usize {
        let mut labels: BTreeSet<&str> = BTreeSet::new();
        for triple in &self.triples {
            if let Term::Blank(label) = &triple.subject {
                labels.insert(label);
            }
            if let Term::Blank(label) = &triple.object {
                labels.insert(label);
            }
        }
        labels.len()
    }

    /// All objects of `(subject, predicate, ?)` in sorted order
    pub fn objects(&self, subject: &Term, predicate: &str) -> Vec<&Term> {
        self.triples
            .iter()
            .filter(|t| &t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
            .collect()
    }

    /// First object of `(subject, predicate, ?)` if any
    pub fn object(&self, subject: &Term, predicate: &str) -> Option<&Term> {
        self.objects(subject, predicate).into_iter().next()
    }

    /// All distinct subjects carrying the predicate, sorted
    pub fn subjects_of(&self, predicate: &str) -> Vec<&Term> {
        let set: BTreeSet<&Term> = self
            .triples
            .iter()
            .filter(|t| t.predicate == predicate)
            .map(|t| &t.subject)
            .collect();
        set.into_iter().collect()
    }

    /// All distinct objects of the predicate, sorted
    pub fn objects_of(&self, predicate: &str) -> Vec<&Term> {
        let set: BTreeSet<&Term> = self
            .triples
            .iter()
            .filter(|t| t.predicate == predicate)
            .map(|t| &t.object)
            .collect();
        set.into_iter().collect()
    }

    /// All subjects with `rdf:type` equal to `class_iri`, sorted
    pub fn instances_of(&self, class_iri: &str) -> Vec<&Term> {
        let class_term = Term::Iri(class_iri.to_string());
        let set: BTreeSet<&Term> = self
            .triples
            .iter()
            .filter(|t| t.predicate == vocab::RDF_TYPE && t.object == class_term)
            .map(|t| &t.subject)
            .collect();
        set.into_iter().collect()
    }

    /// The `rdf:type` objects of a subject, sorted
    pub fn types_of(&self, subject: &Term) -> Vec<&Term> {
        self.objects(subject, vocab::RDF_TYPE)
    }

    /// Canonical N-Quads-style serialization: one line per triple,
    /// lexically sorted, newline-joined.
    ///
    /// This is a deterministic serialization with blank-node labels intact,
    /// not full RDF canonicalization.
    pub fn canonical_nquads(&self) -> String {
        let lines: Vec<String> = self.triples.iter().map(|t| t.to_nquads_line()).collect();
        // BTreeSet iteration is already in Triple order; the line strings
        // sort identically because the lexical form mirrors the term order.
        let mut lines = lines;
        lines.sort();
        lines.join("\n")
    }

    /// Hash of the canonical N-Quads form.
    ///
    /// Refuses graphs whose blank-node count exceeds `blank_node_threshold`:
    /// labelled-lexical hashing is unstable for heavily blank-node-structured
    /// documents (URDNA2015 is future work).
    pub fn canonical_hash(&self, blank_node_threshold: usize) -> GraphResult<String> {
        let count = self.blank_node_count();
        if count > blank_node_threshold {
            return Err(GraphError::BlankNodeHeavy {
                count,
                threshold: blank_node_threshold,
            });
        }
        Ok(ggen_hash::hash_sorted_lines(
            self.triples.iter().map(|t| t.to_nquads_line()),
        ))
    }

    /// All distinct namespaces occupied by IRIs in the graph, with the set
    /// of local names seen in each
    pub fn namespaces(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut add = |iri: &str| {
            let (ns, local) = vocab::split_iri(iri);
            if !ns.is_empty() {
                map.entry(ns.to_string()).or_default().insert(local.to_string());
            }
        };
        for triple in &self.triples {
            if let Term::Iri(iri) = &triple.subject {
                add(iri);
            }
            add(&triple.predicate);
            if let Term::Iri(iri) = &triple.object {
                add(iri);
            }
        }
        map
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Triple;
    type IntoIter = std::collections::btree_set::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Term {
        Term::Iri(s.to_string())
    }

    fn sample() -> Graph {
        Graph::from_triples(
            "<test>",
            [
                Triple::new(
                    iri("http://example.org/john"),
                    vocab::RDF_TYPE,
                    iri("http://xmlns.com/foaf/0.1/Person"),
                ),
                Triple::new(
                    iri("http://example.org/john"),
                    "http://xmlns.com/foaf/0.1/name",
                    Term::string_literal("John"),
                ),
                Triple::new(
                    iri("http://example.org/anna"),
                    vocab::RDF_TYPE,
                    iri("http://xmlns.com/foaf/0.1/Person"),
                ),
            ],
        )
    }

    #[test]
    fn test_set_semantics_deduplicate() {
        let t = Triple::new(
            iri("http://example.org/s"),
            "http://example.org/p",
            Term::string_literal("v"),
        );
        let g = Graph::from_triples("<test>", [t.clone(), t]);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_sorted_restartable_iteration() {
        let g = sample();
        let first: Vec<_> = g.iter().collect();
        let second: Vec<_> = g.iter().collect();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_instances_of() {
        let g = sample();
        let people = g.instances_of("http://xmlns.com/foaf/0.1/Person");
        assert_eq!(people.len(), 2);
        // Sorted: anna before john
        assert_eq!(people[0].as_iri(), Some("http://example.org/anna"));
    }

    #[test]
    fn test_merge_is_union() {
        let mut g = sample();
        let extra = Graph::from_triples(
            "<more>",
            [Triple::new(
                iri("http://example.org/john"),
                "http://xmlns.com/foaf/0.1/age",
                Term::typed_literal("42", vocab::XSD_INTEGER),
            )],
        );
        g.merge(&extra);
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn test_canonical_hash_stable() {
        let a = sample();
        let b = sample();
        assert_eq!(
            a.canonical_hash(128).unwrap(),
            b.canonical_hash(128).unwrap()
        );
    }

    #[test]
    fn test_canonical_hash_rejects_blank_heavy() {
        let mut g = Graph::new("<test>");
        for i in 0..4 {
            g.insert(Triple::new(
                Term::Blank(format!("b{}", i)),
                "http://example.org/p",
                Term::string_literal("v"),
            ));
        }
        let err = g.canonical_hash(2).unwrap_err();
        assert!(matches!(err, GraphError::BlankNodeHeavy { count: 4, .. }));
    }

    #[test]
    fn test_namespaces() {
        let g = sample();
        let ns = g.namespaces();
        assert!(ns.contains_key("http://xmlns.com/foaf/0.1/"));
        assert!(ns.contains_key("http://example.org/"));
    }
}
