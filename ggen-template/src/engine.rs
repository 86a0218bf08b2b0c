//! Deterministic template engine
//!
//! Renders a template body against a context under the determinism
//! contract: no clock, no randomness, no environment, sorted iteration,
//! strict variables. A second render of the same `(template, context)`
//! pair is byte-identical, and usually served from the cache.

use crate::context::RenderContext;
use crate::error::{TemplateError, TemplateResult};
use crate::filters::{self, FORBIDDEN_NAMES};
use crate::frontmatter::Template;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tera::Tera;

/// Default number of rendered bodies kept in the cache
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// Render counters
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderStats {
    pub renders: u64,
    pub cache_hits: u64,
}

/// The engine. Cheap to share behind an `Arc`; all methods take `&self`.
pub struct TemplateEngine {
    prototype: Tera,
    cache: Mutex<LruCache<(String, String), String>>,
    renders: AtomicU64,
    cache_hits: AtomicU64,
}

impl TemplateEngine {
    /// Engine with an empty build environment
    pub fn new() -> Self {
        Self::with_build_env(HashMap::new(), DEFAULT_CACHE_SIZE)
    }

    /// Engine with a build-environment stub taken from the plan.
    ///
    /// The stub is the only ambient data templates can read; nothing in it
    /// may come from the host at render time.
    pub fn with_build_env(build_env: HashMap<String, Value>, cache_size: usize) -> Self {
        let mut prototype = Tera::default();
        filters::register(&mut prototype, &build_env);
        Self {
            prototype,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
            renders: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Render a body against a context.
    ///
    /// `name` labels the template in error messages and the Tera registry.
    pub fn render(&self, name: &str, body: &str, context: &RenderContext) -> TemplateResult<String> {
        scan_forbidden(name, body)?;

        let template_hash = ggen_hash::hash_bytes(body.as_bytes());
        let context_hash = context.content_hash();
        let key = (template_hash, context_hash);

        if let Some(rendered) = self.cache.lock().get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(template = name, "render cache hit");
            return Ok(rendered.clone());
        }

        let mut tera = self.prototype.clone();
        tera.add_raw_template(name, body)
            .map_err(|e| classify_tera_error(e, name))?;

        let rendered = tera
            .render(name, &context.to_tera())
            .map_err(|e| classify_tera_error(e, name))?;

        self.renders.fetch_add(1, Ordering::Relaxed);
        self.cache.lock().put(key, rendered.clone());
        Ok(rendered)
    }

    /// Render a template's body
    pub fn render_template(&self, template: &Template, context: &RenderContext) -> TemplateResult<String> {
        self.render(&template.path, &template.body, context)
    }

    /// Render the `to` output path of a template, when present
    pub fn render_output_path(
        &self,
        template: &Template,
        context: &RenderContext,
    ) -> TemplateResult<Option<String>> {
        match &template.frontmatter.to {
            Some(to) => {
                let name = format!("{}#to", template.path);
                Ok(Some(self.render(&name, to, context)?))
            }
            None => Ok(None),
        }
    }

    /// Counters for metrics aggregation
    pub fn stats(&self) -> RenderStats {
        RenderStats {
            renders: self.renders.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse-time rejection of host-dependent calls.
///
/// Scans the expression and statement blocks for denylisted names used as
/// functions or filters.
fn scan_forbidden(name: &str, body: &str) -> TemplateResult<()> {
    static BLOCK_RE: OnceLock<Regex> = OnceLock::new();
    static CALL_RE: OnceLock<Regex> = OnceLock::new();
    static FILTER_RE: OnceLock<Regex> = OnceLock::new();

    let block_re = BLOCK_RE.get_or_init(|| {
        Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}")
            .unwrap_or_else(|e| panic!("invalid builtin block pattern: {}", e))
    });
    let names = FORBIDDEN_NAMES.join("|");
    let call_re = CALL_RE.get_or_init(|| {
        Regex::new(&format!(r"\b({})\s*\(", names))
            .unwrap_or_else(|e| panic!("invalid builtin call pattern: {}", e))
    });
    let filter_re = FILTER_RE.get_or_init(|| {
        Regex::new(&format!(r"\|\s*({})\b", names))
            .unwrap_or_else(|e| panic!("invalid builtin filter pattern: {}", e))
    });

    for block in block_re.find_iter(body) {
        let text = block.as_str();
        if let Some(cap) = call_re.captures(text).and_then(|c| c.get(1)) {
            return Err(TemplateError::ForbiddenFilter {
                name: cap.as_str().to_string(),
                template: name.to_string(),
            });
        }
        if let Some(cap) = filter_re.captures(text).and_then(|c| c.get(1)) {
            return Err(TemplateError::ForbiddenFilter {
                name: cap.as_str().to_string(),
                template: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Map a Tera error onto the engine's failure modes.
fn classify_tera_error(error: tera::Error, template: &str) -> TemplateError {
    let mut messages = vec![error.to_string()];
    let mut source = std::error::Error::source(&error);
    while let Some(err) = source {
        messages.push(err.to_string());
        source = err.source();
    }
    let full = messages.join(": ");

    if full.contains("not found in context") {
        let name = full
            .split('`')
            .nth(1)
            .unwrap_or("unknown")
            .to_string();
        return TemplateError::UndefinedVariable {
            name,
            template: template.to_string(),
        };
    }

    if full.contains("forbidden non-deterministic") {
        let name = FORBIDDEN_NAMES
            .iter()
            .find(|n| full.contains(**n))
            .copied()
            .unwrap_or("unknown")
            .to_string();
        return TemplateError::ForbiddenFilter {
            name,
            template: template.to_string(),
        };
    }

    TemplateError::Render {
        message: full,
        template: template.to_string(),
        line: None,
    }
}
