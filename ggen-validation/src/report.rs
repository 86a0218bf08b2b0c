//! Conformance report generation
//!
//! Aggregates SHACL and custom-rule output into the public JSON report and
//! a human-readable text summary, and computes the process exit code.

use crate::rules::RuleOutcome;
use crate::shacl::{Severity, ValidationOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One reported error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceError {
    /// Focus node or property path IRI, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
    /// Short constraint name (`minCount`, `datatype`, `rule:<id>`, ...)
    pub constraint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Graph statistics block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub triple_count: usize,
    pub valid: bool,
}

/// Validation statistics block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    /// Duration in milliseconds
    pub duration: u64,
    pub shapes_count: usize,
}

/// The public result of validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub ok: bool,
    pub errors: Vec<ConformanceError>,
    pub graph: GraphStats,
    pub validation: ValidationStats,
    /// Warnings from rules and lax-mode parsing
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl ConformanceReport {
    /// Assemble from SHACL output and rule outcomes.
    pub fn assemble(
        shacl: &ValidationOutcome,
        rules: &[(String, RuleOutcome)],
        triple_count: usize,
        duration_ms: u64,
        shapes_count: usize,
    ) -> ConformanceReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for violation in &shacl.results {
            let message = violation
                .messages
                .first()
                .cloned()
                .unwrap_or_else(|| "Constraint violated".to_string());
            let entry = ConformanceError {
                path: violation
                    .path
                    .clone()
                    .or_else(|| Some(violation.focus_node.clone())),
                message,
                constraint: short_constraint_name(&violation.constraint_component),
                value: violation.value.clone(),
            };
            match violation.severity {
                Severity::Violation => errors.push(entry),
                Severity::Warning | Severity::Info => warnings.push(entry.message),
            }
        }

        for (id, outcome) in rules {
            for violation in &outcome.violations {
                errors.push(ConformanceError {
                    path: None,
                    message: violation.clone(),
                    constraint: format!("rule:{}", id),
                    value: None,
                });
            }
            for warning in &outcome.warnings {
                warnings.push(format!("[{}] {}", id, warning));
            }
        }

        let ok = errors.is_empty();
        ConformanceReport {
            ok,
            graph: GraphStats {
                triple_count,
                valid: ok,
            },
            validation: ValidationStats {
                duration: duration_ms,
                shapes_count,
            },
            errors,
            warnings,
        }
    }

    /// JSON document per the external interface
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Human-readable text summary
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Validation {}: {} triple(s), {} shape(s), {}ms\n",
            if self.ok { "passed" } else { "FAILED" },
            self.graph.triple_count,
            self.validation.shapes_count,
            self.validation.duration
        ));
        if !self.errors.is_empty() {
            out.push_str(&format!("Errors ({}):\n", self.errors.len()));
            for error in &self.errors {
                match &error.path {
                    Some(path) => out.push_str(&format!(
                        "  [{}] {} ({})\n",
                        error.constraint, error.message, path
                    )),
                    None => out.push_str(&format!("  [{}] {}\n", error.constraint, error.message)),
                }
            }
        }
        if !self.warnings.is_empty() {
            out.push_str(&format!("Warnings ({}):\n", self.warnings.len()));
            for warning in &self.warnings {
                out.push_str(&format!("  {}\n", warning));
            }
        }
        out
    }
}

/// `http://www.w3.org/ns/shacl#MinCountConstraintComponent` → `minCount`
pub fn short_constraint_name(component_iri: &str) -> String {
    let local = component_iri
        .rsplit(['#', '/'])
        .next()
        .unwrap_or(component_iri);
    let stripped = local.strip_suffix("ConstraintComponent").unwrap_or(local);
    let mut chars = stripped.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_ascii_lowercase(), chars.as_str()),
        None => String::new(),
    }
}

/// Outcome flags feeding the exit-code table
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitStatus {
    /// The pipeline itself failed (parse error, bad shapes, I/O)
    pub had_error: bool,
    /// Violations or drift were found
    pub found_violations: bool,
    /// Whether findings are fatal (`fail` mode) or absorbed (`warn`/`fix`)
    pub fail_mode: bool,
}

/// Fixed exit-code table: 1 on error, 3 on violations in fail mode,
/// 0 otherwise.
pub fn exit_code(status: ExitStatus) -> i32 {
    if status.had_error {
        return 1;
    }
    if status.found_violations && status.fail_mode {
        return 3;
    }
    0
}
