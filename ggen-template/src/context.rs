//! Render context
//!
//! A read-only mapping from variable name to JSON value. Sorted keys by
//! construction; depth-bounded so adversarially nested values surface
//! `cycle-in-context` instead of exhausting the stack.

use crate::error::{TemplateError, TemplateResult};
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum nesting depth accepted in a context value
pub const MAX_CONTEXT_DEPTH: usize = 64;

/// Variable bindings for one render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    variables: BTreeMap<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object, validating nesting depth.
    pub fn from_object(object: serde_json::Map<String, Value>) -> TemplateResult<Self> {
        let mut variables = BTreeMap::new();
        for (key, value) in object {
            check_depth(&value, 0)?;
            variables.insert(key, value);
        }
        Ok(Self { variables })
    }

    /// Build from any JSON value; non-objects are rejected.
    pub fn from_value(value: Value) -> TemplateResult<Self> {
        match value {
            Value::Object(map) => Self::from_object(map),
            other => Err(TemplateError::Frontmatter {
                template: "<context>".to_string(),
                message: format!("Context must be a mapping, got {}", type_name(&other)),
            }),
        }
    }

    /// Insert a binding, validating depth
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> TemplateResult<()> {
        check_depth(&value, 0)?;
        self.variables.insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Sorted iteration over bindings
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> + '_ {
        self.variables.iter()
    }

    /// Merge another context over this one; `other` wins on key clashes
    pub fn merged_with(&self, other: &RenderContext) -> RenderContext {
        let mut variables = self.variables.clone();
        for (k, v) in &other.variables {
            variables.insert(k.clone(), v.clone());
        }
        RenderContext { variables }
    }

    /// Context as a single JSON object (sorted keys)
    pub fn to_value(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map)
    }

    /// Canonical-JSON hash of the whole context
    pub fn content_hash(&self) -> String {
        ggen_hash::hash_json(&self.to_value())
    }

    /// Tera context with every binding inserted
    pub fn to_tera(&self) -> tera::Context {
        let mut ctx = tera::Context::new();
        for (key, value) in &self.variables {
            ctx.insert(key, value);
        }
        ctx
    }

    /// Truthiness used by `skipIf`/`unless` expressions: false for null,
    /// false, 0, "" and "false"; true otherwise. Absent variables are falsy.
    pub fn is_truthy(&self, name: &str) -> bool {
        match self.variables.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => !s.is_empty() && s != "false",
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
        }
    }

    /// String form of a variable for `k==v` comparisons
    pub fn string_of(&self, name: &str) -> Option<String> {
        match self.variables.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Null => None,
            other => Some(ggen_hash::canonical_json(other)),
        }
    }
}

fn check_depth(value: &Value, depth: usize) -> TemplateResult<()> {
    if depth > MAX_CONTEXT_DEPTH {
        return Err(TemplateError::CycleInContext {
            max_depth: MAX_CONTEXT_DEPTH,
        });
    }
    match value {
        Value::Array(items) => {
            for item in items {
                check_depth(item, depth + 1)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                check_depth(item, depth + 1)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
