//! Built-in rules
//!
//! Graph size, datatype consistency, URI form, blank-node usage, namespace
//! consistency, subclass-cycle detection and functional-property
//! consistency.

use super::{Rule, RuleCategory, RuleOutcome, RuleSeverity};
use crate::error::ValidationResult;
use ggen_graph::{vocab, Graph, Term};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Every built-in rule, in registration order
pub fn all(max_graph_triples: usize) -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(GraphSizeRule { max_triples: max_graph_triples }),
        Arc::new(DatatypeConsistencyRule),
        Arc::new(UriFormRule),
        Arc::new(BlankNodeUsageRule),
        Arc::new(NamespaceConsistencyRule),
        Arc::new(SubclassCycleRule),
        Arc::new(FunctionalPropertyRule),
    ]
}

/// Fails when the triple count exceeds the configured bound
pub struct GraphSizeRule {
    pub max_triples: usize,
}

impl Rule for GraphSizeRule {
    fn id(&self) -> &str {
        "graph-size"
    }
    fn name(&self) -> &str {
        "Graph size bound"
    }
    fn severity(&self) -> RuleSeverity {
        RuleSeverity::High
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Performance
    }

    fn execute(&self, graph: &Graph) -> ValidationResult<RuleOutcome> {
        let count = graph.len();
        let mut outcome = RuleOutcome::pass();
        outcome.metadata = json!({ "tripleCount": count, "maxTriples": self.max_triples });
        if count > self.max_triples {
            outcome.passed = false;
            outcome.violations.push(format!(
                "Graph has {} triples, exceeding the maximum of {}",
                count, self.max_triples
            ));
        }
        Ok(outcome)
    }
}

/// Warns when one predicate carries literals of different datatypes
pub struct DatatypeConsistencyRule;

impl Rule for DatatypeConsistencyRule {
    fn id(&self) -> &str {
        "datatype-consistency"
    }
    fn name(&self) -> &str {
        "Datatype consistency"
    }
    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Medium
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Consistency
    }

    fn execute(&self, graph: &Graph) -> ValidationResult<RuleOutcome> {
        let mut datatypes: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for triple in graph.iter() {
            if let Some(datatype) = triple.object.literal_datatype() {
                datatypes
                    .entry(triple.predicate.as_str())
                    .or_default()
                    .insert(datatype);
            }
        }

        let mut outcome = RuleOutcome::pass();
        for (predicate, seen) in &datatypes {
            if seen.len() > 1 {
                outcome.warnings.push(format!(
                    "Predicate {} carries literals of {} different datatypes: {}",
                    predicate,
                    seen.len(),
                    seen.iter().copied().collect::<Vec<_>>().join(", ")
                ));
            }
        }
        outcome.metadata = json!({ "predicatesChecked": datatypes.len() });
        Ok(outcome)
    }
}

/// Warns on IRIs outside http(s)
pub struct UriFormRule;

impl Rule for UriFormRule {
    fn id(&self) -> &str {
        "uri-form"
    }
    fn name(&self) -> &str {
        "HTTP(S) URI form"
    }
    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Low
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Naming
    }

    fn execute(&self, graph: &Graph) -> ValidationResult<RuleOutcome> {
        let mut offenders: BTreeSet<&str> = BTreeSet::new();
        let check = |iri: &str| !(iri.starts_with("http://") || iri.starts_with("https://"));
        for triple in graph.iter() {
            if let Term::Iri(iri) = &triple.subject {
                if check(iri) {
                    offenders.insert(iri);
                }
            }
            if check(&triple.predicate) {
                offenders.insert(&triple.predicate);
            }
            if let Term::Iri(iri) = &triple.object {
                if check(iri) {
                    offenders.insert(iri);
                }
            }
        }

        let mut outcome = RuleOutcome::pass();
        for iri in &offenders {
            outcome.warnings.push(format!("IRI is not HTTP(S): {}", iri));
        }
        outcome.metadata = json!({ "nonHttpIris": offenders.len() });
        Ok(outcome)
    }
}

/// Warns on blank nodes that appear exactly once as an object and never as
/// a subject: likely dangling structure.
pub struct BlankNodeUsageRule;

impl Rule for BlankNodeUsageRule {
    fn id(&self) -> &str {
        "blank-node-usage"
    }
    fn name(&self) -> &str {
        "Blank node usage"
    }
    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Low
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Structure
    }

    fn execute(&self, graph: &Graph) -> ValidationResult<RuleOutcome> {
        let mut object_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut subjects: BTreeSet<&str> = BTreeSet::new();
        for triple in graph.iter() {
            if let Term::Blank(label) = &triple.subject {
                subjects.insert(label);
            }
            if let Term::Blank(label) = &triple.object {
                *object_counts.entry(label).or_insert(0) += 1;
            }
        }

        let mut outcome = RuleOutcome::pass();
        for (label, count) in &object_counts {
            if *count == 1 && !subjects.contains(label) {
                outcome
                    .warnings
                    .push(format!("Blank node _:{} is referenced once and never described", label));
            }
        }
        Ok(outcome)
    }
}

/// Warns on namespaces occupied by a single term
pub struct NamespaceConsistencyRule;

impl Rule for NamespaceConsistencyRule {
    fn id(&self) -> &str {
        "namespace-consistency"
    }
    fn name(&self) -> &str {
        "Namespace consistency"
    }
    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Low
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Naming
    }

    fn execute(&self, graph: &Graph) -> ValidationResult<RuleOutcome> {
        let namespaces = graph.namespaces();
        let mut outcome = RuleOutcome::pass();
        for (namespace, locals) in &namespaces {
            if locals.len() == 1 {
                outcome.warnings.push(format!(
                    "Namespace {} is occupied by a single term",
                    namespace
                ));
            }
        }
        outcome.metadata = json!({ "namespaceCount": namespaces.len() });
        Ok(outcome)
    }
}

/// Detects cycles in the `rdfs:subClassOf` hierarchy via DFS with a
/// recursion stack; reports a class on each cycle found.
pub struct SubclassCycleRule;

impl Rule for SubclassCycleRule {
    fn id(&self) -> &str {
        "owl-subclass-cycle"
    }
    fn name(&self) -> &str {
        "Subclass hierarchy acyclicity"
    }
    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Critical
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Semantics
    }

    fn execute(&self, graph: &Graph) -> ValidationResult<RuleOutcome> {
        // Adjacency: class -> direct superclasses
        let mut edges: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for triple in graph.iter() {
            if triple.predicate != vocab::RDFS_SUBCLASS_OF {
                continue;
            }
            if let (Term::Iri(sub), Term::Iri(sup)) = (&triple.subject, &triple.object) {
                edges.entry(sub).or_default().insert(sup);
            }
        }

        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut on_cycle: BTreeSet<&str> = BTreeSet::new();

        for start in edges.keys() {
            if visited.contains(*start) {
                continue;
            }
            let mut stack: Vec<(&str, Vec<&str>)> = vec![(*start, vec![*start])];
            while let Some((node, path)) = stack.pop() {
                visited.insert(node);
                if let Some(supers) = edges.get(node) {
                    for sup in supers {
                        if let Some(pos) = path.iter().position(|p| p == sup) {
                            for member in &path[pos..] {
                                on_cycle.insert(*member);
                            }
                            on_cycle.insert(*sup);
                        } else {
                            let mut next_path = path.clone();
                            next_path.push(*sup);
                            stack.push((*sup, next_path));
                        }
                    }
                }
            }
        }

        let mut outcome = RuleOutcome::pass();
        if !on_cycle.is_empty() {
            outcome.passed = false;
            for class in &on_cycle {
                outcome
                    .violations
                    .push(format!("Class {} is part of a subClassOf cycle", class));
            }
        }
        outcome.metadata = json!({ "classesOnCycles": on_cycle.len() });
        Ok(outcome)
    }
}

/// Flags subjects with two distinct objects on a property declared
/// `owl:FunctionalProperty`.
pub struct FunctionalPropertyRule;

impl Rule for FunctionalPropertyRule {
    fn id(&self) -> &str {
        "functional-property"
    }
    fn name(&self) -> &str {
        "Functional property consistency"
    }
    fn severity(&self) -> RuleSeverity {
        RuleSeverity::High
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Consistency
    }

    fn execute(&self, graph: &Graph) -> ValidationResult<RuleOutcome> {
        let functional: BTreeSet<&str> = graph
            .instances_of(vocab::OWL_FUNCTIONAL_PROPERTY)
            .into_iter()
            .filter_map(|t| t.as_iri())
            .collect();

        let mut values: BTreeMap<(&Term, &str), BTreeSet<&Term>> = BTreeMap::new();
        for triple in graph.iter() {
            if functional.contains(triple.predicate.as_str()) {
                values
                    .entry((&triple.subject, triple.predicate.as_str()))
                    .or_default()
                    .insert(&triple.object);
            }
        }

        let mut outcome = RuleOutcome::pass();
        for ((subject, predicate), objects) in &values {
            if objects.len() > 1 {
                outcome.passed = false;
                outcome.violations.push(format!(
                    "Functional property {} has {} distinct values on {}",
                    predicate,
                    objects.len(),
                    subject
                ));
            }
        }
        outcome.metadata = json!({ "functionalProperties": functional.len() });
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ggen_graph::GraphFormat;

    fn parse(text: &str) -> Graph {
        Graph::parse(text.as_bytes(), GraphFormat::Turtle, "<test>").unwrap()
    }

    #[test]
    fn test_graph_size_rule() {
        let graph = parse(
            r#"
@prefix ex: <http://example.org/> .
ex:a ex:p ex:b . ex:c ex:p ex:d .
"#,
        );
        let rule = GraphSizeRule { max_triples: 1 };
        let outcome = rule.execute(&graph).unwrap();
        assert!(!outcome.passed);

        let rule = GraphSizeRule { max_triples: 10 };
        assert!(rule.execute(&graph).unwrap().passed);
    }

    #[test]
    fn test_datatype_consistency_warns() {
        let graph = parse(
            r#"
@prefix ex: <http://example.org/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
ex:a ex:value "1"^^xsd:integer .
ex:b ex:value "x"^^xsd:string .
"#,
        );
        let outcome = DatatypeConsistencyRule.execute(&graph).unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_uri_form_warns_on_urn() {
        let graph = parse(
            r#"
@prefix ex: <http://example.org/> .
<urn:thing:1> ex:p ex:b .
"#,
        );
        let outcome = UriFormRule.execute(&graph).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("urn:thing:1"));
    }

    #[test]
    fn test_subclass_cycle_detected() {
        let graph = parse(
            r#"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix ex: <http://example.org/> .
ex:A rdfs:subClassOf ex:B .
ex:B rdfs:subClassOf ex:C .
ex:C rdfs:subClassOf ex:A .
"#,
        );
        let outcome = SubclassCycleRule.execute(&graph).unwrap();
        assert!(!outcome.passed);
        // At least one class on the cycle is named
        assert!(outcome
            .violations
            .iter()
            .any(|v| v.contains("http://example.org/A")
                || v.contains("http://example.org/B")
                || v.contains("http://example.org/C")));
    }

    #[test]
    fn test_acyclic_hierarchy_passes() {
        let graph = parse(
            r#"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix ex: <http://example.org/> .
ex:Dog rdfs:subClassOf ex:Animal .
ex:Cat rdfs:subClassOf ex:Animal .
"#,
        );
        assert!(SubclassCycleRule.execute(&graph).unwrap().passed);
    }

    #[test]
    fn test_functional_property_violation() {
        let graph = parse(
            r#"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix ex: <http://example.org/> .
ex:birthDate a owl:FunctionalProperty .
ex:john ex:birthDate "1990-01-01" .
ex:john ex:birthDate "1991-06-05" .
"#,
        );
        let outcome = FunctionalPropertyRule.execute(&graph).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.violations.len(), 1);
    }

    #[test]
    fn test_blank_node_usage() {
        let graph = parse(
            r#"
@prefix ex: <http://example.org/> .
ex:a ex:p _:dangling .
ex:b ex:q [ ex:r ex:c ] .
"#,
        );
        let outcome = BlankNodeUsageRule.execute(&graph).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("dangling") || !outcome.warnings.is_empty());
    }

    #[test]
    fn test_namespace_consistency() {
        let graph = parse(
            r#"
@prefix ex: <http://example.org/> .
@prefix lonely: <http://lonely.example/ns#> .
ex:a ex:p lonely:only .
"#,
        );
        let outcome = NamespaceConsistencyRule.execute(&graph).unwrap();
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("http://lonely.example/ns#")));
    }
}
