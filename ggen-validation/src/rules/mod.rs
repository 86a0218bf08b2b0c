//! Custom-rule engine
//!
//! Rules are registered at compile time and validated on registration:
//! the id must match `[A-Za-z0-9_-]+`, severity and category come from
//! closed sets. Dynamic code loading is replaced by data-driven
//! configuration.

pub mod builtin;

use crate::error::{ValidationError, ValidationResult};
use crate::shacl::ValidationOptions;
use ggen_graph::Graph;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Rule severity (distinct from SHACL severities)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Closed category list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleCategory {
    Consistency,
    Structure,
    Naming,
    Performance,
    Semantics,
}

/// Result of executing one rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub passed: bool,
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
    pub metadata: Value,
}

impl RuleOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
            warnings: Vec::new(),
            metadata: Value::Null,
        }
    }
}

/// A named validation rule over a graph
pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn severity(&self) -> RuleSeverity;
    fn category(&self) -> RuleCategory;
    fn execute(&self, graph: &Graph) -> ValidationResult<RuleOutcome>;
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+$")
            .unwrap_or_else(|e| panic!("invalid builtin id pattern: {}", e))
    })
}

/// Registered rules, executed in registration order
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a rule.
    ///
    /// Rejection happens before any validation runs: a bad id (for example
    /// a path-like `../../etc`) never reaches execution.
    pub fn register(&mut self, rule: Arc<dyn Rule>) -> ValidationResult<()> {
        let id = rule.id().to_string();
        if !id_pattern().is_match(&id) {
            return Err(ValidationError::RuleRejected {
                id,
                message: "id must match [A-Za-z0-9_-]+".to_string(),
            });
        }
        if self.rules.iter().any(|r| r.id() == id) {
            return Err(ValidationError::RuleRejected {
                id,
                message: "id already registered".to_string(),
            });
        }
        tracing::debug!(rule = %id, "rule registered");
        self.rules.push(rule);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Rule>> + '_ {
        self.rules.iter()
    }

    /// Execute every rule; failures of the rule machinery abort, rule
    /// violations are data.
    pub fn execute_all(
        &self,
        graph: &Graph,
        options: &ValidationOptions,
    ) -> ValidationResult<Vec<(String, RuleOutcome)>> {
        let mut outcomes = Vec::new();
        for rule in &self.rules {
            if options.cancelled() {
                return Err(ValidationError::Cancelled);
            }
            let outcome = rule.execute(graph)?;
            outcomes.push((rule.id().to_string(), outcome));
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedRule(&'static str);

    impl Rule for NamedRule {
        fn id(&self) -> &str {
            self.0
        }
        fn name(&self) -> &str {
            "test rule"
        }
        fn severity(&self) -> RuleSeverity {
            RuleSeverity::Low
        }
        fn category(&self) -> RuleCategory {
            RuleCategory::Structure
        }
        fn execute(&self, _graph: &Graph) -> ValidationResult<RuleOutcome> {
            Ok(RuleOutcome::pass())
        }
    }

    #[test]
    fn test_register_valid_id() {
        let mut registry = RuleRegistry::new();
        registry.register(Arc::new(NamedRule("my-rule_1"))).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_path_like_id_rejected_before_validation() {
        let mut registry = RuleRegistry::new();
        let err = registry.register(Arc::new(NamedRule("../../etc"))).unwrap_err();
        assert_eq!(err.kind(), "custom-rule-failed");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = RuleRegistry::new();
        registry.register(Arc::new(NamedRule("dup"))).unwrap();
        let err = registry.register(Arc::new(NamedRule("dup"))).unwrap_err();
        assert_eq!(err.kind(), "custom-rule-failed");
    }
}
