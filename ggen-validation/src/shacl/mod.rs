//! SHACL validator
//!
//! Loads a shapes graph, validates a data graph, and emits a structured
//! conformance outcome. Compiled shapes are cached in an LRU keyed by the
//! shapes graph hash; the cache has a single writer.

mod eval;
mod shapes;

pub use shapes::{CompiledShapes, Constraint, NodeKindConstraint, NodeShape, PropertyShape, Target};

use crate::error::{ValidationError, ValidationResult};
use ggen_graph::{vocab, Graph};
use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// SHACL result severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Violation,
}

impl Severity {
    pub fn from_iri(iri: &str) -> Option<Severity> {
        match iri {
            vocab::SH_INFO => Some(Severity::Info),
            vocab::SH_WARNING => Some(Severity::Warning),
            vocab::SH_VIOLATION => Some(Severity::Violation),
            _ => None,
        }
    }

    pub fn as_iri(&self) -> &'static str {
        match self {
            Severity::Info => vocab::SH_INFO,
            Severity::Warning => vocab::SH_WARNING,
            Severity::Violation => vocab::SH_VIOLATION,
        }
    }
}

/// One validation result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Focus node id (IRI, or `_:label` for blank nodes)
    pub focus_node: String,
    /// Property path, absent for node-level constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Offending value (literal lexical form or IRI)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Human messages
    pub messages: Vec<String>,
    pub severity: Severity,
    /// Constraint-component IRI
    pub constraint_component: String,
    /// Source shape id
    pub source_shape: String,
}

/// Validator output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub conforms: bool,
    pub results: Vec<Violation>,
    pub total_violations: usize,
}

/// Per-call options: deadline and cooperative cancellation
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Exceeding the deadline returns `timeout` with no partial writes
    pub deadline: Option<Duration>,
    /// Checked between shape evaluations
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl ValidationOptions {
    pub fn cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|f| f.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapesCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// The SHACL validator with its compiled-shapes cache
pub struct ShaclValidator {
    cache: RwLock<LruCache<String, Arc<CompiledShapes>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ShaclValidator {
    /// Validator with an LRU bound on compiled shapes
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Compile (or fetch from cache) and evaluate.
    pub fn validate(
        &self,
        data: &Graph,
        shapes: &Graph,
        options: &ValidationOptions,
    ) -> ValidationResult<ValidationOutcome> {
        let compiled = self.compile_cached(shapes)?;
        eval::evaluate(data, &compiled, options)
    }

    /// Compile a shapes graph, consulting the cache first.
    pub fn compile_cached(&self, shapes: &Graph) -> ValidationResult<Arc<CompiledShapes>> {
        // Cache key hashing tolerates blank-node-heavy shapes graphs; the
        // key only needs to be stable within this process.
        let key = shapes
            .canonical_hash(usize::MAX)
            .map_err(ValidationError::Graph)?;

        if let Some(found) = self.cache.write().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(found));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(shapes::compile(shapes)?);
        self.cache.write().put(key, Arc::clone(&compiled));
        tracing::debug!(shapes = compiled.shapes.len(), "compiled shapes graph");
        Ok(compiled)
    }

    /// Drop every compiled shapes graph (rule registration calls this)
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    pub fn cache_stats(&self) -> ShapesCacheStats {
        ShapesCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ggen_graph::GraphFormat;

    const SHAPES: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://example.org/shapes/> .

ex:PersonShape a sh:NodeShape ;
    sh:targetClass foaf:Person ;
    sh:property ex:PersonEmailShape .

ex:PersonEmailShape a sh:PropertyShape ;
    sh:path foaf:email ;
    sh:minCount 1 .
"#;

    const DATA_INVALID: &str = r#"
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://example.org/> .

ex:john a foaf:Person ;
    foaf:name "John" .
"#;

    const DATA_VALID: &str = r#"
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://example.org/> .

ex:john a foaf:Person ;
    foaf:name "John" ;
    foaf:email "john@example.org" .
"#;

    fn parse(text: &str) -> Graph {
        Graph::parse(text.as_bytes(), GraphFormat::Turtle, "<test>").unwrap()
    }

    #[test]
    fn test_min_count_violation() {
        let validator = ShaclValidator::new(8);
        let outcome = validator
            .validate(&parse(DATA_INVALID), &parse(SHAPES), &ValidationOptions::default())
            .unwrap();
        assert!(!outcome.conforms);
        assert_eq!(outcome.total_violations, 1);
        let violation = &outcome.results[0];
        assert_eq!(violation.focus_node, "http://example.org/john");
        assert_eq!(violation.path.as_deref(), Some("http://xmlns.com/foaf/0.1/email"));
        assert!(violation
            .constraint_component
            .ends_with("MinCountConstraintComponent"));
    }

    #[test]
    fn test_conforming_data() {
        let validator = ShaclValidator::new(8);
        let outcome = validator
            .validate(&parse(DATA_VALID), &parse(SHAPES), &ValidationOptions::default())
            .unwrap();
        assert!(outcome.conforms);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_shapes_cache_hit_on_second_validate() {
        let validator = ShaclValidator::new(8);
        let shapes = parse(SHAPES);
        let data = parse(DATA_VALID);
        validator.validate(&data, &shapes, &ValidationOptions::default()).unwrap();
        validator.validate(&data, &shapes, &ValidationOptions::default()).unwrap();
        let stats = validator.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_clear_cache() {
        let validator = ShaclValidator::new(8);
        let shapes = parse(SHAPES);
        validator.compile_cached(&shapes).unwrap();
        validator.clear_cache();
        validator.compile_cached(&shapes).unwrap();
        assert_eq!(validator.cache_stats().misses, 2);
    }

    #[test]
    fn test_cancellation_between_shapes() {
        let validator = ShaclValidator::new(8);
        let flag = Arc::new(AtomicBool::new(true));
        let options = ValidationOptions {
            deadline: None,
            cancel_flag: Some(flag),
        };
        let err = validator
            .validate(&parse(DATA_VALID), &parse(SHAPES), &options)
            .unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }
}
