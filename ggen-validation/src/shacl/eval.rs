//! Shape evaluation
//!
//! Order is fixed: targets select focus nodes, property shapes run in
//! shape-id order, node constraints follow. The same (data, shapes) pair
//! always yields the same violation sequence.

use super::shapes::{term_id, CompiledShapes, Constraint, NodeShape, Target};
use super::{Severity, ValidationOptions, ValidationOutcome, Violation};
use crate::error::{ValidationError, ValidationResult};
use ggen_graph::{vocab, Graph, Term};
use std::collections::BTreeSet;
use std::time::Instant;

/// Maximum `sh:node` nesting depth
const MAX_NODE_DEPTH: usize = 8;

const SH_NS: &str = "http://www.w3.org/ns/shacl#";

/// Evaluate every shape against the data graph.
pub fn evaluate(
    data: &Graph,
    shapes: &CompiledShapes,
    options: &ValidationOptions,
) -> ValidationResult<ValidationOutcome> {
    let started = Instant::now();
    let mut results = Vec::new();

    for shape in &shapes.shapes {
        check_interrupt(options, &started)?;
        if shape.targets.is_empty() {
            // Referenced-only shapes (sh:node) do not select focus nodes
            continue;
        }
        for focus in collect_focus_nodes(data, shape) {
            evaluate_shape_at(data, shapes, shape, &focus, &mut results, 0)?;
        }
    }

    let total_violations = results
        .iter()
        .filter(|v: &&Violation| v.severity == Severity::Violation)
        .count();

    Ok(ValidationOutcome {
        conforms: total_violations == 0,
        total_violations,
        results,
    })
}

fn check_interrupt(options: &ValidationOptions, started: &Instant) -> ValidationResult<()> {
    if options.cancelled() {
        return Err(ValidationError::Cancelled);
    }
    if let Some(deadline) = options.deadline {
        if started.elapsed() > deadline {
            return Err(ValidationError::Timeout {
                deadline_ms: deadline.as_millis() as u64,
            });
        }
    }
    Ok(())
}

/// Focus nodes of a shape, sorted and deduplicated
fn collect_focus_nodes(data: &Graph, shape: &NodeShape) -> BTreeSet<Term> {
    let mut focus = BTreeSet::new();
    for target in &shape.targets {
        match target {
            Target::Class(class) => {
                for class in class_with_subclasses(data, class) {
                    for term in data.instances_of(&class) {
                        focus.insert(term.clone());
                    }
                }
            }
            Target::Node(id) => {
                focus.insert(term_from_id(id));
            }
            Target::SubjectsOf(predicate) => {
                for term in data.subjects_of(predicate) {
                    focus.insert(term.clone());
                }
            }
            Target::ObjectsOf(predicate) => {
                for term in data.objects_of(predicate) {
                    focus.insert(term.clone());
                }
            }
        }
    }
    focus
}

/// The class plus its transitive subclasses (fixed-point over
/// `rdfs:subClassOf`), sorted.
fn class_with_subclasses(data: &Graph, class: &str) -> BTreeSet<String> {
    let mut closure: BTreeSet<String> = BTreeSet::new();
    closure.insert(class.to_string());
    loop {
        let mut grew = false;
        for triple in data.iter() {
            if triple.predicate != vocab::RDFS_SUBCLASS_OF {
                continue;
            }
            let (sub, sup) = match (&triple.subject, &triple.object) {
                (Term::Iri(sub), Term::Iri(sup)) => (sub, sup),
                _ => continue,
            };
            if closure.contains(sup) && !closure.contains(sub) {
                closure.insert(sub.clone());
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    closure
}

fn term_from_id(id: &str) -> Term {
    match id.strip_prefix("_:") {
        Some(label) => Term::Blank(label.to_string()),
        None => Term::Iri(id.to_string()),
    }
}

/// Property shapes first (in shape-id order), then node constraints.
fn evaluate_shape_at(
    data: &Graph,
    shapes: &CompiledShapes,
    shape: &NodeShape,
    focus: &Term,
    results: &mut Vec<Violation>,
    depth: usize,
) -> ValidationResult<()> {
    for property in &shape.property_shapes {
        let values = data.objects(focus, &property.path);
        eval_constraints(
            data,
            shapes,
            focus,
            Some(&property.path),
            &values,
            &property.constraints,
            property.severity,
            &property.messages,
            &property.id,
            results,
            depth,
        )?;
    }

    let self_values = vec![focus];
    eval_constraints(
        data,
        shapes,
        focus,
        None,
        &self_values,
        &shape.constraints,
        shape.severity,
        &shape.messages,
        &shape.id,
        results,
        depth,
    )?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn eval_constraints(
    data: &Graph,
    shapes: &CompiledShapes,
    focus: &Term,
    path: Option<&str>,
    values: &[&Term],
    constraints: &[Constraint],
    severity: Severity,
    messages: &[String],
    source_shape: &str,
    results: &mut Vec<Violation>,
    depth: usize,
) -> ValidationResult<()> {
    let mut report = |value: Option<&Term>, component: &str, default_message: String| {
        let messages = if messages.is_empty() {
            vec![default_message]
        } else {
            messages.to_vec()
        };
        results.push(Violation {
            focus_node: term_id(focus),
            path: path.map(|p| p.to_string()),
            value: value.map(term_id),
            messages,
            severity,
            constraint_component: format!("{}{}", SH_NS, component),
            source_shape: source_shape.to_string(),
        });
    };

    for constraint in constraints {
        match constraint {
            Constraint::MinCount(min) => {
                if (values.len() as u64) < *min {
                    report(
                        None,
                        "MinCountConstraintComponent",
                        format!(
                            "Expected at least {} value(s) for {}, found {}",
                            min,
                            path.unwrap_or("focus node"),
                            values.len()
                        ),
                    );
                }
            }
            Constraint::MaxCount(max) => {
                if (values.len() as u64) > *max {
                    report(
                        None,
                        "MaxCountConstraintComponent",
                        format!(
                            "Expected at most {} value(s) for {}, found {}",
                            max,
                            path.unwrap_or("focus node"),
                            values.len()
                        ),
                    );
                }
            }
            Constraint::Class(class) => {
                let acceptable = class_with_subclasses(data, class);
                for value in values {
                    let has_type = data
                        .types_of(value)
                        .iter()
                        .any(|t| t.as_iri().map(|iri| acceptable.contains(iri)).unwrap_or(false));
                    if !has_type {
                        report(
                            Some(*value),
                            "ClassConstraintComponent",
                            format!("Value is not an instance of {}", class),
                        );
                    }
                }
            }
            Constraint::Datatype(datatype) => {
                for value in values {
                    if value.literal_datatype() != Some(datatype.as_str()) {
                        report(
                            Some(*value),
                            "DatatypeConstraintComponent",
                            format!("Value does not have datatype {}", datatype),
                        );
                    }
                }
            }
            Constraint::NodeKind(kind) => {
                for value in values {
                    if !kind.matches(value) {
                        report(
                            Some(*value),
                            "NodeKindConstraintComponent",
                            format!("Value has the wrong node kind (expected {:?})", kind),
                        );
                    }
                }
            }
            Constraint::MinInclusive(min) => {
                for value in values {
                    match numeric_value(value) {
                        Some(n) if n >= *min => {}
                        Some(n) => report(
                            Some(*value),
                            "MinInclusiveConstraintComponent",
                            format!("Value {} is below the minimum {}", n, min),
                        ),
                        None => report(
                            Some(*value),
                            "MinInclusiveConstraintComponent",
                            "Value is not numeric".to_string(),
                        ),
                    }
                }
            }
            Constraint::MaxInclusive(max) => {
                for value in values {
                    match numeric_value(value) {
                        Some(n) if n <= *max => {}
                        Some(n) => report(
                            Some(*value),
                            "MaxInclusiveConstraintComponent",
                            format!("Value {} is above the maximum {}", n, max),
                        ),
                        None => report(
                            Some(*value),
                            "MaxInclusiveConstraintComponent",
                            "Value is not numeric".to_string(),
                        ),
                    }
                }
            }
            Constraint::MinLength(min) => {
                for value in values {
                    let text = string_value(value);
                    if (text.chars().count() as u64) < *min {
                        report(
                            Some(*value),
                            "MinLengthConstraintComponent",
                            format!("Value is shorter than {} characters", min),
                        );
                    }
                }
            }
            Constraint::MaxLength(max) => {
                for value in values {
                    let text = string_value(value);
                    if (text.chars().count() as u64) > *max {
                        report(
                            Some(*value),
                            "MaxLengthConstraintComponent",
                            format!("Value is longer than {} characters", max),
                        );
                    }
                }
            }
            Constraint::Pattern { source, regex } => {
                for value in values {
                    let text = string_value(value);
                    if !regex.is_match(&text) {
                        report(
                            Some(*value),
                            "PatternConstraintComponent",
                            format!("Value does not match pattern '{}'", source),
                        );
                    }
                }
            }
            Constraint::In(allowed) => {
                for value in values {
                    if !allowed.iter().any(|a| a == *value) {
                        report(
                            Some(*value),
                            "InConstraintComponent",
                            "Value is not in the allowed list".to_string(),
                        );
                    }
                }
            }
            Constraint::HasValue(expected) => {
                if !values.iter().any(|v| *v == expected) {
                    report(
                        None,
                        "HasValueConstraintComponent",
                        format!("Required value {} is missing", expected),
                    );
                }
            }
            Constraint::Node(shape_id) => {
                if depth >= MAX_NODE_DEPTH {
                    return Err(ValidationError::InvalidShapes {
                        message: format!("sh:node nesting deeper than {}", MAX_NODE_DEPTH),
                    });
                }
                if let Some(nested) = shapes.get(shape_id) {
                    for value in values {
                        let mut nested_results = Vec::new();
                        evaluate_shape_at(
                            data,
                            shapes,
                            nested,
                            value,
                            &mut nested_results,
                            depth + 1,
                        )?;
                        if nested_results
                            .iter()
                            .any(|v| v.severity == Severity::Violation)
                        {
                            report(
                                Some(*value),
                                "NodeConstraintComponent",
                                format!("Value does not conform to shape {}", shape_id),
                            );
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn numeric_value(term: &Term) -> Option<f64> {
    term.literal_value()?.parse::<f64>().ok()
}

fn string_value(term: &Term) -> String {
    match term {
        Term::Iri(iri) => iri.clone(),
        Term::Blank(label) => format!("_:{}", label),
        Term::Literal { lexical, .. } => lexical.clone(),
    }
}
