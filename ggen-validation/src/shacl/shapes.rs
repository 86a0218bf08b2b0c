//! Shapes graph compilation
//!
//! Turns the RDF form of a shapes graph into typed shapes. Property shapes
//! are sorted by their shape id so evaluation (and therefore violation
//! ordering) is stable.

use crate::error::{ValidationError, ValidationResult};
use super::Severity;
use ggen_graph::{vocab, Graph, Term};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// How a shape selects focus nodes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Target {
    /// `sh:targetClass`: SHACL instances of the class
    Class(String),
    /// `sh:targetNode`: one named node
    Node(String),
    /// `sh:targetSubjectsOf`: subjects carrying the predicate
    SubjectsOf(String),
    /// `sh:targetObjectsOf`: objects of the predicate
    ObjectsOf(String),
}

/// `sh:nodeKind` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKindConstraint {
    Iri,
    BlankNode,
    Literal,
    IriOrLiteral,
    BlankNodeOrIri,
    BlankNodeOrLiteral,
}

impl NodeKindConstraint {
    fn from_iri(iri: &str) -> Option<Self> {
        match iri {
            vocab::SH_IRI => Some(Self::Iri),
            vocab::SH_BLANK_NODE => Some(Self::BlankNode),
            vocab::SH_LITERAL => Some(Self::Literal),
            vocab::SH_IRI_OR_LITERAL => Some(Self::IriOrLiteral),
            vocab::SH_BLANK_NODE_OR_IRI => Some(Self::BlankNodeOrIri),
            vocab::SH_BLANK_NODE_OR_LITERAL => Some(Self::BlankNodeOrLiteral),
            _ => None,
        }
    }

    pub fn matches(&self, term: &Term) -> bool {
        match self {
            Self::Iri => term.is_iri(),
            Self::BlankNode => term.is_blank(),
            Self::Literal => term.is_literal(),
            Self::IriOrLiteral => term.is_iri() || term.is_literal(),
            Self::BlankNodeOrIri => term.is_blank() || term.is_iri(),
            Self::BlankNodeOrLiteral => term.is_blank() || term.is_literal(),
        }
    }
}

/// A compiled constraint. Variants are evaluated in declaration order.
#[derive(Debug, Clone)]
pub enum Constraint {
    Class(String),
    Datatype(String),
    NodeKind(NodeKindConstraint),
    MinCount(u64),
    MaxCount(u64),
    MinInclusive(f64),
    MaxInclusive(f64),
    MinLength(u64),
    MaxLength(u64),
    Pattern { source: String, regex: Regex },
    In(Vec<Term>),
    HasValue(Term),
    /// Nested shape reference (`sh:node`)
    Node(String),
}

/// A compiled property shape
#[derive(Debug, Clone)]
pub struct PropertyShape {
    /// Shape id (IRI or `_:label`)
    pub id: String,
    /// Property path (single predicate IRI)
    pub path: String,
    pub constraints: Vec<Constraint>,
    pub severity: Severity,
    pub messages: Vec<String>,
}

/// A compiled node shape
#[derive(Debug, Clone)]
pub struct NodeShape {
    pub id: String,
    pub targets: Vec<Target>,
    /// Sorted by property-shape id for stable violation ordering
    pub property_shapes: Vec<PropertyShape>,
    /// Constraints on the focus node itself
    pub constraints: Vec<Constraint>,
    pub severity: Severity,
    pub messages: Vec<String>,
}

/// The compiled form of a shapes graph
#[derive(Debug, Clone, Default)]
pub struct CompiledShapes {
    /// Sorted by shape id
    pub shapes: Vec<NodeShape>,
    by_id: BTreeMap<String, usize>,
}

impl CompiledShapes {
    pub fn get(&self, id: &str) -> Option<&NodeShape> {
        self.by_id.get(id).map(|i| &self.shapes[*i])
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// Stable id for a term in reports: IRI, `_:label`, or lexical form
pub(crate) fn term_id(term: &Term) -> String {
    match term {
        Term::Iri(iri) => iri.clone(),
        Term::Blank(label) => format!("_:{}", label),
        Term::Literal { lexical, .. } => lexical.clone(),
    }
}

/// Compile a shapes graph.
pub fn compile(graph: &Graph) -> ValidationResult<CompiledShapes> {
    let mut candidates: BTreeSet<Term> = BTreeSet::new();

    for term in graph.instances_of(vocab::SH_NODE_SHAPE) {
        candidates.insert(term.clone());
    }
    for predicate in [
        vocab::SH_TARGET_CLASS,
        vocab::SH_TARGET_NODE,
        vocab::SH_TARGET_SUBJECTS_OF,
        vocab::SH_TARGET_OBJECTS_OF,
    ] {
        for term in graph.subjects_of(predicate) {
            candidates.insert(term.clone());
        }
    }
    // Shapes referenced by sh:node must be compiled even without targets
    for term in graph.objects_of(vocab::SH_NODE) {
        candidates.insert(term.clone());
    }

    let mut shapes = Vec::new();
    for candidate in &candidates {
        shapes.push(compile_node_shape(graph, candidate)?);
    }
    shapes.sort_by(|a, b| a.id.cmp(&b.id));

    let by_id = shapes
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.clone(), i))
        .collect();

    Ok(CompiledShapes { shapes, by_id })
}

fn compile_node_shape(graph: &Graph, subject: &Term) -> ValidationResult<NodeShape> {
    let mut targets = Vec::new();
    for object in graph.objects(subject, vocab::SH_TARGET_CLASS) {
        targets.push(Target::Class(expect_iri(object, "sh:targetClass")?));
    }
    for object in graph.objects(subject, vocab::SH_TARGET_NODE) {
        targets.push(Target::Node(term_id(object)));
    }
    for object in graph.objects(subject, vocab::SH_TARGET_SUBJECTS_OF) {
        targets.push(Target::SubjectsOf(expect_iri(object, "sh:targetSubjectsOf")?));
    }
    for object in graph.objects(subject, vocab::SH_TARGET_OBJECTS_OF) {
        targets.push(Target::ObjectsOf(expect_iri(object, "sh:targetObjectsOf")?));
    }
    targets.sort();

    let mut property_shapes = Vec::new();
    for object in graph.objects(subject, vocab::SH_PROPERTY) {
        property_shapes.push(compile_property_shape(graph, object)?);
    }
    property_shapes.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(NodeShape {
        id: term_id(subject),
        targets,
        property_shapes,
        constraints: compile_constraints(graph, subject)?,
        severity: shape_severity(graph, subject),
        messages: shape_messages(graph, subject),
    })
}

fn compile_property_shape(graph: &Graph, subject: &Term) -> ValidationResult<PropertyShape> {
    let path = graph
        .object(subject, vocab::SH_PATH)
        .ok_or_else(|| ValidationError::InvalidShapes {
            message: format!("property shape {} has no sh:path", term_id(subject)),
        })?;
    let path = path.as_iri().ok_or_else(|| ValidationError::InvalidShapes {
        message: format!(
            "property shape {} uses a complex path; only predicate paths are supported",
            term_id(subject)
        ),
    })?;

    Ok(PropertyShape {
        id: term_id(subject),
        path: path.to_string(),
        constraints: compile_constraints(graph, subject)?,
        severity: shape_severity(graph, subject),
        messages: shape_messages(graph, subject),
    })
}

/// Compile the constraint parameters present on a shape, in fixed order.
fn compile_constraints(graph: &Graph, subject: &Term) -> ValidationResult<Vec<Constraint>> {
    let mut constraints = Vec::new();

    for object in graph.objects(subject, vocab::SH_CLASS) {
        constraints.push(Constraint::Class(expect_iri(object, "sh:class")?));
    }
    for object in graph.objects(subject, vocab::SH_DATATYPE) {
        constraints.push(Constraint::Datatype(expect_iri(object, "sh:datatype")?));
    }
    for object in graph.objects(subject, vocab::SH_NODE_KIND) {
        let iri = expect_iri(object, "sh:nodeKind")?;
        let kind = NodeKindConstraint::from_iri(&iri).ok_or_else(|| {
            ValidationError::InvalidShapes {
                message: format!("unknown sh:nodeKind {}", iri),
            }
        })?;
        constraints.push(Constraint::NodeKind(kind));
    }
    if let Some(n) = integer_param(graph, subject, vocab::SH_MIN_COUNT)? {
        constraints.push(Constraint::MinCount(n));
    }
    if let Some(n) = integer_param(graph, subject, vocab::SH_MAX_COUNT)? {
        constraints.push(Constraint::MaxCount(n));
    }
    if let Some(n) = number_param(graph, subject, vocab::SH_MIN_INCLUSIVE)? {
        constraints.push(Constraint::MinInclusive(n));
    }
    if let Some(n) = number_param(graph, subject, vocab::SH_MAX_INCLUSIVE)? {
        constraints.push(Constraint::MaxInclusive(n));
    }
    if let Some(n) = integer_param(graph, subject, vocab::SH_MIN_LENGTH)? {
        constraints.push(Constraint::MinLength(n));
    }
    if let Some(n) = integer_param(graph, subject, vocab::SH_MAX_LENGTH)? {
        constraints.push(Constraint::MaxLength(n));
    }
    for object in graph.objects(subject, vocab::SH_PATTERN) {
        let source = object
            .literal_value()
            .ok_or_else(|| ValidationError::InvalidShapes {
                message: "sh:pattern must be a literal".to_string(),
            })?
            .to_string();
        let regex = Regex::new(&source).map_err(|e| ValidationError::InvalidShapes {
            message: format!("invalid sh:pattern '{}': {}", source, e),
        })?;
        constraints.push(Constraint::Pattern { source, regex });
    }
    for object in graph.objects(subject, vocab::SH_IN) {
        constraints.push(Constraint::In(read_list(graph, object)?));
    }
    for object in graph.objects(subject, vocab::SH_HAS_VALUE) {
        constraints.push(Constraint::HasValue(object.clone()));
    }
    for object in graph.objects(subject, vocab::SH_NODE) {
        constraints.push(Constraint::Node(term_id(object)));
    }

    Ok(constraints)
}

fn shape_severity(graph: &Graph, subject: &Term) -> Severity {
    graph
        .object(subject, vocab::SH_SEVERITY)
        .and_then(|t| t.as_iri())
        .and_then(Severity::from_iri)
        .unwrap_or(Severity::Violation)
}

fn shape_messages(graph: &Graph, subject: &Term) -> Vec<String> {
    graph
        .objects(subject, vocab::SH_MESSAGE)
        .iter()
        .filter_map(|t| t.literal_value().map(|s| s.to_string()))
        .collect()
}

fn expect_iri(term: &Term, parameter: &str) -> ValidationResult<String> {
    term.as_iri()
        .map(|s| s.to_string())
        .ok_or_else(|| ValidationError::InvalidShapes {
            message: format!("{} must be an IRI, got {}", parameter, term),
        })
}

fn integer_param(graph: &Graph, subject: &Term, predicate: &str) -> ValidationResult<Option<u64>> {
    match graph.object(subject, predicate) {
        None => Ok(None),
        Some(term) => {
            let lexical = term.literal_value().ok_or_else(|| {
                ValidationError::InvalidShapes {
                    message: format!("{} must be an integer literal", predicate),
                }
            })?;
            lexical
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ValidationError::InvalidShapes {
                    message: format!("{} is not a non-negative integer: {}", predicate, lexical),
                })
        }
    }
}

fn number_param(graph: &Graph, subject: &Term, predicate: &str) -> ValidationResult<Option<f64>> {
    match graph.object(subject, predicate) {
        None => Ok(None),
        Some(term) => {
            let lexical = term.literal_value().ok_or_else(|| {
                ValidationError::InvalidShapes {
                    message: format!("{} must be a numeric literal", predicate),
                }
            })?;
            lexical
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ValidationError::InvalidShapes {
                    message: format!("{} is not a number: {}", predicate, lexical),
                })
        }
    }
}

/// Walk an `rdf:first`/`rdf:rest` list
fn read_list(graph: &Graph, head: &Term) -> ValidationResult<Vec<Term>> {
    let mut items = Vec::new();
    let mut current = head.clone();
    let mut steps = 0usize;
    loop {
        if current.as_iri() == Some(vocab::RDF_NIL) {
            break;
        }
        steps += 1;
        if steps > 10_000 {
            return Err(ValidationError::InvalidShapes {
                message: "sh:in list is too long or cyclic".to_string(),
            });
        }
        let first = graph
            .object(&current, vocab::RDF_FIRST)
            .ok_or_else(|| ValidationError::InvalidShapes {
                message: "malformed sh:in list: missing rdf:first".to_string(),
            })?;
        items.push(first.clone());
        let rest = graph
            .object(&current, vocab::RDF_REST)
            .ok_or_else(|| ValidationError::InvalidShapes {
                message: "malformed sh:in list: missing rdf:rest".to_string(),
            })?;
        current = rest.clone();
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ggen_graph::GraphFormat;

    fn parse(text: &str) -> Graph {
        Graph::parse(text.as_bytes(), GraphFormat::Turtle, "<shapes>").unwrap()
    }

    #[test]
    fn test_compile_basic_shape() {
        let shapes = parse(
            r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://example.org/shapes/> .

ex:PersonShape a sh:NodeShape ;
    sh:targetClass foaf:Person ;
    sh:property ex:NameShape .

ex:NameShape sh:path foaf:name ;
    sh:minCount 1 ;
    sh:maxCount 2 ;
    sh:datatype <http://www.w3.org/2001/XMLSchema#string> .
"#,
        );
        let compiled = compile(&shapes).unwrap();
        assert_eq!(compiled.len(), 1);
        let shape = &compiled.shapes[0];
        assert_eq!(shape.id, "http://example.org/shapes/PersonShape");
        assert_eq!(
            shape.targets,
            vec![Target::Class("http://xmlns.com/foaf/0.1/Person".to_string())]
        );
        assert_eq!(shape.property_shapes.len(), 1);
        assert_eq!(shape.property_shapes[0].constraints.len(), 3);
    }

    #[test]
    fn test_in_list_compiles() {
        let shapes = parse(
            r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <http://example.org/> .

ex:StatusShape a sh:NodeShape ;
    sh:targetSubjectsOf ex:status ;
    sh:property [ sh:path ex:status ; sh:in ( "open" "closed" ) ] .
"#,
        );
        let compiled = compile(&shapes).unwrap();
        let shape = &compiled.shapes[0];
        let property = &shape.property_shapes[0];
        match &property.constraints[0] {
            Constraint::In(items) => assert_eq!(items.len(), 2),
            other => panic!("expected In constraint, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let shapes = parse(
            r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <http://example.org/> .

ex:BadShape a sh:NodeShape ;
    sh:targetSubjectsOf ex:p ;
    sh:pattern "([" .
"#,
        );
        let err = compile(&shapes).unwrap_err();
        assert_eq!(err.kind(), "shape-violation");
    }

    #[test]
    fn test_property_shape_without_path_rejected() {
        let shapes = parse(
            r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <http://example.org/> .

ex:Shape a sh:NodeShape ;
    sh:property [ sh:minCount 1 ] .
"#,
        );
        assert!(compile(&shapes).is_err());
    }
}
