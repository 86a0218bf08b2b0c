// ggen-validation: SHACL shapes and custom graph rules
// Shapes graphs compile into typed shapes, evaluation order is fixed so
// violation ordering is stable, and compiled shapes are cached by graph
// hash. Custom rules are compile-time registered, never loaded at runtime.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod error;
pub mod report;
pub mod rules;
pub mod shacl;

pub use error::{ValidationError, ValidationResult};
pub use report::{ConformanceError, ConformanceReport, exit_code, ExitStatus};
pub use rules::{
    builtin, Rule, RuleCategory, RuleOutcome, RuleRegistry, RuleSeverity,
};
pub use shacl::{
    Severity, ShaclValidator, ValidationOptions, ValidationOutcome, Violation,
};

use ggen_graph::Graph;
use std::sync::Arc;

/// The validation pipeline: SHACL shapes plus registered custom rules.
///
/// Registering a rule clears the compiled-shapes cache.
pub struct ValidationPipeline {
    shacl: ShaclValidator,
    rules: RuleRegistry,
}

impl ValidationPipeline {
    pub fn new(shapes_cache_size: usize) -> Self {
        Self {
            shacl: ShaclValidator::new(shapes_cache_size),
            rules: RuleRegistry::new(),
        }
    }

    /// Pipeline with every built-in rule registered
    pub fn with_builtin_rules(shapes_cache_size: usize, max_graph_triples: usize) -> ValidationResult<Self> {
        let mut pipeline = Self::new(shapes_cache_size);
        for rule in builtin::all(max_graph_triples) {
            pipeline.register_rule(rule)?;
        }
        Ok(pipeline)
    }

    pub fn shacl(&self) -> &ShaclValidator {
        &self.shacl
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Register a custom rule; validates id/severity/category and clears
    /// the compiled-shapes cache.
    pub fn register_rule(&mut self, rule: Arc<dyn Rule>) -> ValidationResult<()> {
        self.rules.register(rule)?;
        self.shacl.clear_cache();
        Ok(())
    }

    /// Validate a data graph against shapes and all registered rules.
    pub fn validate(
        &self,
        data: &Graph,
        shapes: &Graph,
        options: &ValidationOptions,
    ) -> ValidationResult<(ValidationOutcome, Vec<(String, RuleOutcome)>)> {
        let outcome = self.shacl.validate(data, shapes, options)?;
        let rule_outcomes = self.rules.execute_all(data, options)?;
        Ok((outcome, rule_outcomes))
    }
}
