//! Drift classification
//!
//! RDF documents diff as triple sets with predicate-importance weights;
//! everything else falls back to line-level heuristics over declarations,
//! assignments and other content changes.

use ggen_graph::{vocab, Graph, GraphDiff, GraphFormat, Triple};
use std::collections::BTreeMap;

/// Predicates whose change weighs 1.0
const HIGH_WEIGHT_PREDICATES: &[&str] = &[
    vocab::RDF_TYPE,
    vocab::RDFS_SUBCLASS_OF,
    vocab::OWL_SAME_AS,
    vocab::OWL_EQUIVALENT_CLASS,
];

/// Predicates whose change weighs 0.5 (labels, comments, titles)
const MEDIUM_WEIGHT_PREDICATES: &[&str] = &[
    vocab::RDFS_LABEL,
    vocab::RDFS_COMMENT,
    vocab::DC_TITLE,
    vocab::DC_ELEMENTS_TITLE,
];

const OTHER_WEIGHT: f64 = 0.3;

/// RDF-aware classification of a changed document
#[derive(Debug, Clone)]
pub struct RdfClassification {
    /// No triple-level change at all
    pub identical: bool,
    /// Weighted significance in [0, 1]
    pub significance: f64,
    pub added: usize,
    pub removed: usize,
    pub details: Vec<String>,
}

/// Diff two graphs and score the change.
pub fn classify_rdf(expected: &Graph, current: &Graph) -> RdfClassification {
    let diff = GraphDiff::compute(expected, current);
    if diff.is_identical() {
        return RdfClassification {
            identical: true,
            significance: 0.0,
            added: 0,
            removed: 0,
            details: Vec::new(),
        };
    }

    let total = (diff.common.len() + diff.added.len() + diff.removed.len()).max(1);
    let weighted: f64 = diff
        .added
        .iter()
        .chain(diff.removed.iter())
        .map(triple_weight)
        .sum();
    let significance = (weighted / total as f64).min(1.0);

    let mut details = Vec::new();
    for triple in diff.added.iter().take(16) {
        details.push(format!("+ {}", triple));
    }
    for triple in diff.removed.iter().take(16) {
        details.push(format!("- {}", triple));
    }

    RdfClassification {
        identical: false,
        significance,
        added: diff.added.len(),
        removed: diff.removed.len(),
        details,
    }
}

fn triple_weight(triple: &Triple) -> f64 {
    let predicate = triple.predicate.as_str();
    if HIGH_WEIGHT_PREDICATES.contains(&predicate) {
        1.0
    } else if MEDIUM_WEIGHT_PREDICATES.contains(&predicate) {
        0.5
    } else {
        OTHER_WEIGHT
    }
}

/// Try to parse both sides in the same format.
pub fn parse_both(
    expected: &[u8],
    current: &[u8],
    format: GraphFormat,
) -> Option<(Graph, Graph)> {
    let expected = Graph::parse(expected, format, "<expected>").ok()?;
    let current = Graph::parse(current, format, "<current>").ok()?;
    Some((expected, current))
}

/// Line-change buckets for non-RDF artifacts
#[derive(Debug, Clone, Default)]
pub struct LineClassification {
    pub structural_lines: usize,
    pub value_lines: usize,
    pub other_lines: usize,
    /// min(weighted sum / (2 * baseline lines), 1)
    pub significance: f64,
    pub details: Vec<String>,
}

const STRUCTURAL_KEYWORDS: &[&str] = &[
    "class", "function", "interface", "import", "export", "fn", "struct", "trait", "use", "enum",
    "impl", "def",
];

/// Compare two texts line-wise (as multisets) and score the change with
/// syntactic heuristics: declarations +2, assignment values +1, other +0.8.
pub fn classify_lines(expected: &str, current: &str) -> LineClassification {
    let expected_counts = line_counts(expected);
    let current_counts = line_counts(current);

    let mut changed: Vec<&str> = Vec::new();
    for (line, count) in &current_counts {
        let before = expected_counts.get(line).copied().unwrap_or(0);
        for _ in before..*count {
            changed.push(line);
        }
    }
    for (line, count) in &expected_counts {
        let now = current_counts.get(line).copied().unwrap_or(0);
        for _ in now..*count {
            changed.push(line);
        }
    }

    let mut result = LineClassification::default();
    let mut sum = 0.0f64;
    for line in changed {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_structural(trimmed) {
            result.structural_lines += 1;
            sum += 2.0;
        } else if is_assignment(trimmed) {
            result.value_lines += 1;
            sum += 1.0;
        } else {
            result.other_lines += 1;
            sum += 0.8;
        }
        if result.details.len() < 16 {
            result.details.push(trimmed.to_string());
        }
    }

    let baseline_lines = expected.lines().count().max(1);
    result.significance = (sum / (2.0 * baseline_lines as f64)).min(1.0);
    result
}

fn line_counts(text: &str) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for line in text.lines() {
        *counts.entry(line).or_insert(0) += 1;
    }
    counts
}

fn is_structural(line: &str) -> bool {
    let first_words: Vec<&str> = line.split_whitespace().take(3).collect();
    STRUCTURAL_KEYWORDS
        .iter()
        .any(|kw| first_words.contains(kw))
}

fn is_assignment(line: &str) -> bool {
    match line.find('=') {
        None => false,
        Some(pos) => {
            let bytes = line.as_bytes();
            let next = bytes.get(pos + 1).copied();
            let prev = if pos > 0 { bytes.get(pos - 1).copied() } else { None };
            next != Some(b'=') && prev != Some(b'!') && prev != Some(b'<') && prev != Some(b'>')
        }
    }
}
