//! Frontmatter processor
//!
//! Splits a template into a directive header (between two `---` lines at the
//! start) and a body, validates the closed directive set, and evaluates the
//! skip expressions that gate generation.

use crate::context::RenderContext;
use crate::error::{TemplateError, TemplateResult};
use std::path::Path;

/// Write policy for a generated artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Replace the whole file
    Write,
    /// Insert at a `before`/`after` anchor inside an existing file
    Inject,
    /// Append to the end of an existing file
    Append,
    /// Prepend to the start of an existing file
    Prepend,
    /// Insert at a 1-based line number
    LineAt(u64),
}

/// How the `rdf` directive locates its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfSourceKind {
    File,
    Str,
    Inline,
}

/// Optional graph binding declared in frontmatter
#[derive(Debug, Clone, PartialEq)]
pub struct RdfBinding {
    /// File path, literal document, or inline fragment depending on kind
    pub source: String,
    pub kind: RdfSourceKind,
    /// Format name; inferred from the file extension when absent
    pub format: Option<String>,
}

/// `unless` accepts either a boolean or a string expression
#[derive(Debug, Clone, PartialEq)]
pub enum UnlessDirective {
    Bool(bool),
    Expr(String),
}

/// Parsed frontmatter directives
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    /// Output path, itself renderable from context
    pub to: Option<String>,
    /// Injection anchor: insert before the first line containing this text
    pub before: Option<String>,
    /// Injection anchor: insert after the first line containing this text
    pub after: Option<String>,
    /// 1-based insertion line
    pub line_at: Option<u64>,
    /// Skip expression: `name`, `!name`, `k==v`, `k!=v`
    pub skip_if: Option<String>,
    /// Alternative skip form
    pub unless: Option<UnlessDirective>,
    /// Unix mode for the output file
    pub chmod: Option<u32>,
    /// Enforce determinism checks (default true)
    pub deterministic: bool,
    /// Write a hash-suffixed filename (default true)
    pub content_addressed: bool,
    /// Emit the `.attest.json` sidecar (default true)
    pub attestations: bool,
    /// Optional graph binding
    pub rdf: Option<RdfBinding>,
    /// Warnings collected in lax mode (unknown directives)
    pub warnings: Vec<String>,

    mode: ModeDirectives,
}

/// Raw mode-related directives before invariant checking
#[derive(Debug, Clone, Default, PartialEq)]
struct ModeDirectives {
    explicit: Option<String>,
    inject: bool,
    append: bool,
    prepend: bool,
}

/// A loaded template: path, directives, body, engine version
#[derive(Debug, Clone)]
pub struct Template {
    pub path: String,
    pub frontmatter: Frontmatter,
    pub body: String,
    pub engine_version: String,
    /// SHA-256 of the raw template text; one changed byte changes this
    pub source_hash: String,
}

impl Template {
    /// Parse template text. `strict` controls unknown-directive handling.
    pub fn parse(text: &str, path: impl Into<String>, strict: bool) -> TemplateResult<Template> {
        let path = path.into();
        let (header, body) = split_frontmatter(text);
        let frontmatter = match header {
            Some(header) => Frontmatter::parse(header, &path, strict)?,
            None => Frontmatter::default_values(),
        };
        Ok(Template {
            source_hash: ggen_hash::hash_bytes(text.as_bytes()),
            path,
            frontmatter,
            body: body.to_string(),
            engine_version: crate::ENGINE_VERSION.to_string(),
        })
    }

    /// Load and parse a template file
    pub fn load(path: &Path, strict: bool) -> TemplateResult<Template> {
        let text = std::fs::read_to_string(path).map_err(|e| TemplateError::Frontmatter {
            template: path.display().to_string(),
            message: format!("Failed to read template: {}", e),
        })?;
        Template::parse(&text, path.display().to_string(), strict)
    }
}

/// Split a template into an optional header block and the body.
///
/// The header is the text between two `---` lines at the very start of the
/// document; anything else is all body.
pub fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let mut lines = text.split_inclusive('\n');
    let first = match lines.next() {
        Some(line) => line,
        None => return (None, text),
    };
    if first.trim_end() != "---" {
        return (None, text);
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if line.trim_end() == "---" {
            let header = &text[header_start..offset];
            let body = &text[offset + line.len()..];
            return (Some(header), body);
        }
        offset += line.len();
    }
    // Unterminated header: treat the whole document as body
    (None, text)
}

impl Frontmatter {
    fn default_values() -> Frontmatter {
        Frontmatter {
            deterministic: true,
            content_addressed: true,
            attestations: true,
            ..Frontmatter::default()
        }
    }

    /// Parse a YAML-subset header. Anchors and aliases are rejected.
    pub fn parse(header: &str, template: &str, strict: bool) -> TemplateResult<Frontmatter> {
        if header_uses_anchors(header) {
            return Err(TemplateError::Frontmatter {
                template: template.to_string(),
                message: "YAML anchors and aliases are not supported in frontmatter".to_string(),
            });
        }

        let value: serde_yaml::Value =
            serde_yaml::from_str(header).map_err(|e| TemplateError::Frontmatter {
                template: template.to_string(),
                message: e.to_string(),
            })?;

        let mapping = match value {
            serde_yaml::Value::Null => return Ok(Frontmatter::default_values()),
            serde_yaml::Value::Mapping(m) => m,
            other => {
                return Err(TemplateError::Frontmatter {
                    template: template.to_string(),
                    message: format!("Frontmatter must be a mapping, got {:?}", other),
                })
            }
        };

        let mut fm = Frontmatter::default_values();

        for (key, value) in mapping {
            let key = match key {
                serde_yaml::Value::String(s) => s,
                other => {
                    return Err(TemplateError::Frontmatter {
                        template: template.to_string(),
                        message: format!("Directive names must be strings, got {:?}", other),
                    })
                }
            };

            match key.as_str() {
                "to" => fm.to = Some(expect_string(&key, value, template)?),
                "mode" => fm.mode.explicit = Some(expect_string(&key, value, template)?),
                "before" => fm.before = Some(expect_string(&key, value, template)?),
                "after" => fm.after = Some(expect_string(&key, value, template)?),
                "lineAt" => fm.line_at = Some(expect_u64(&key, value, template)?),
                "skipIf" => fm.skip_if = Some(expect_string(&key, value, template)?),
                "unless" => {
                    fm.unless = Some(match value {
                        serde_yaml::Value::Bool(b) => UnlessDirective::Bool(b),
                        serde_yaml::Value::String(s) => UnlessDirective::Expr(s),
                        other => {
                            return Err(TemplateError::Frontmatter {
                                template: template.to_string(),
                                message: format!("'unless' must be boolean or string, got {:?}", other),
                            })
                        }
                    })
                }
                "chmod" => fm.chmod = Some(parse_chmod(value, template)?),
                "deterministic" => fm.deterministic = expect_bool(&key, value, template)?,
                "contentAddressed" => fm.content_addressed = expect_bool(&key, value, template)?,
                "attestations" => fm.attestations = expect_bool(&key, value, template)?,
                "inject" => fm.mode.inject = expect_bool(&key, value, template)?,
                "append" => fm.mode.append = expect_bool(&key, value, template)?,
                "prepend" => fm.mode.prepend = expect_bool(&key, value, template)?,
                "rdf" => fm.rdf = Some(parse_rdf(value, template)?),
                other => {
                    if strict {
                        return Err(TemplateError::UnknownDirective {
                            name: other.to_string(),
                            template: template.to_string(),
                        });
                    }
                    tracing::warn!(template, directive = other, "unknown frontmatter directive");
                    fm.warnings.push(format!("unknown directive '{}'", other));
                }
            }
        }

        fm.validate(template)?;
        Ok(fm)
    }

    /// Enforce the mode invariants.
    fn validate(&self, template: &str) -> TemplateResult<()> {
        let mut modes: Vec<&str> = Vec::new();
        if self.mode.inject || self.mode.explicit.as_deref() == Some("inject") {
            modes.push("inject");
        }
        if self.mode.append || self.mode.explicit.as_deref() == Some("append") {
            modes.push("append");
        }
        if self.mode.prepend || self.mode.explicit.as_deref() == Some("prepend") {
            modes.push("prepend");
        }
        if self.line_at.is_some() || self.mode.explicit.as_deref() == Some("lineAt") {
            modes.push("lineAt");
        }
        if modes.len() > 1 {
            return Err(TemplateError::ConflictingDirectives {
                template: template.to_string(),
                message: format!("at most one of inject/append/prepend/lineAt allowed, got {:?}", modes),
            });
        }

        if let Some(mode) = self.mode.explicit.as_deref() {
            if !matches!(mode, "write" | "inject" | "append" | "prepend" | "lineAt") {
                return Err(TemplateError::Frontmatter {
                    template: template.to_string(),
                    message: format!("unknown mode '{}'", mode),
                });
            }
            if mode == "lineAt" && self.line_at.is_none() {
                return Err(TemplateError::ConflictingDirectives {
                    template: template.to_string(),
                    message: "mode lineAt requires a lineAt directive".to_string(),
                });
            }
        }

        let injecting = modes.first() == Some(&"inject");
        if (self.before.is_some() || self.after.is_some()) && !injecting {
            return Err(TemplateError::ConflictingDirectives {
                template: template.to_string(),
                message: "'before'/'after' require inject mode".to_string(),
            });
        }
        if injecting && self.before.is_none() && self.after.is_none() {
            return Err(TemplateError::ConflictingDirectives {
                template: template.to_string(),
                message: "inject mode requires a 'before' or 'after' anchor".to_string(),
            });
        }

        if let Some(line) = self.line_at {
            if line < 1 {
                return Err(TemplateError::ConflictingDirectives {
                    template: template.to_string(),
                    message: "lineAt must be >= 1".to_string(),
                });
            }
        }

        Ok(())
    }

    /// The write policy for this template
    pub fn operation_mode(&self) -> OperationMode {
        if let Some(line) = self.line_at {
            return OperationMode::LineAt(line);
        }
        if self.mode.inject || self.mode.explicit.as_deref() == Some("inject") {
            return OperationMode::Inject;
        }
        if self.mode.append || self.mode.explicit.as_deref() == Some("append") {
            return OperationMode::Append;
        }
        if self.mode.prepend || self.mode.explicit.as_deref() == Some("prepend") {
            return OperationMode::Prepend;
        }
        OperationMode::Write
    }

    /// Evaluate the skip directives against a context.
    ///
    /// `skipIf` is checked first; when it holds the entry is skipped
    /// regardless of `unless`.
    pub fn should_skip(&self, context: &RenderContext) -> bool {
        if let Some(expr) = &self.skip_if {
            if eval_skip_expr(expr, context) {
                return true;
            }
        }
        match &self.unless {
            Some(UnlessDirective::Bool(b)) => *b,
            Some(UnlessDirective::Expr(expr)) => eval_skip_expr(expr, context),
            None => false,
        }
    }
}

/// Evaluate `name`, `!name`, `k==v`, `k!=v` against the context.
fn eval_skip_expr(expr: &str, context: &RenderContext) -> bool {
    let expr = expr.trim();
    if let Some((key, value)) = expr.split_once("==") {
        return context.string_of(key.trim()).as_deref() == Some(strip_quotes(value.trim()));
    }
    if let Some((key, value)) = expr.split_once("!=") {
        return context.string_of(key.trim()).as_deref() != Some(strip_quotes(value.trim()));
    }
    if let Some(name) = expr.strip_prefix('!') {
        return !context.is_truthy(name.trim());
    }
    context.is_truthy(expr)
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'')
}

/// Crude anchor/alias detection: a value starting with `&` or `*`
fn header_uses_anchors(header: &str) -> bool {
    header.lines().any(|line| {
        line.split_once(':')
            .map(|(_, v)| {
                let v = v.trim();
                v.starts_with('&') || v.starts_with('*')
            })
            .unwrap_or(false)
    })
}

fn expect_string(key: &str, value: serde_yaml::Value, template: &str) -> TemplateResult<String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        other => Err(TemplateError::Frontmatter {
            template: template.to_string(),
            message: format!("'{}' must be a string, got {:?}", key, other),
        }),
    }
}

fn expect_bool(key: &str, value: serde_yaml::Value, template: &str) -> TemplateResult<bool> {
    match value {
        serde_yaml::Value::Bool(b) => Ok(b),
        other => Err(TemplateError::Frontmatter {
            template: template.to_string(),
            message: format!("'{}' must be a boolean, got {:?}", key, other),
        }),
    }
}

fn expect_u64(key: &str, value: serde_yaml::Value, template: &str) -> TemplateResult<u64> {
    match value {
        serde_yaml::Value::Number(n) => n.as_u64().ok_or_else(|| TemplateError::Frontmatter {
            template: template.to_string(),
            message: format!("'{}' must be a non-negative integer", key),
        }),
        other => Err(TemplateError::Frontmatter {
            template: template.to_string(),
            message: format!("'{}' must be an integer, got {:?}", key, other),
        }),
    }
}

/// `chmod` accepts an integer (used as-is) or an octal string (`"755"`,
/// `"0755"`, `"0o755"`).
fn parse_chmod(value: serde_yaml::Value, template: &str) -> TemplateResult<u32> {
    match value {
        serde_yaml::Value::Number(n) => {
            n.as_u64()
                .map(|v| v as u32)
                .ok_or_else(|| TemplateError::Frontmatter {
                    template: template.to_string(),
                    message: "'chmod' must be a non-negative integer".to_string(),
                })
        }
        serde_yaml::Value::String(s) => {
            let digits = s.trim_start_matches("0o").trim_start_matches('0');
            let digits = if digits.is_empty() { "0" } else { digits };
            u32::from_str_radix(digits, 8).map_err(|_| TemplateError::Frontmatter {
                template: template.to_string(),
                message: format!("'chmod' is not a valid octal mode: {}", s),
            })
        }
        other => Err(TemplateError::Frontmatter {
            template: template.to_string(),
            message: format!("'chmod' must be an integer or octal string, got {:?}", other),
        }),
    }
}

/// `rdf` accepts a mapping `{source, type, format}` or a bare string path.
fn parse_rdf(value: serde_yaml::Value, template: &str) -> TemplateResult<RdfBinding> {
    match value {
        serde_yaml::Value::String(source) => Ok(RdfBinding {
            source,
            kind: RdfSourceKind::File,
            format: None,
        }),
        serde_yaml::Value::Mapping(map) => {
            let mut source = None;
            let mut kind = RdfSourceKind::File;
            let mut format = None;
            for (k, v) in map {
                let k = match k {
                    serde_yaml::Value::String(s) => s,
                    _ => continue,
                };
                match k.as_str() {
                    "source" => source = Some(expect_string("rdf.source", v, template)?),
                    "type" => {
                        let t = expect_string("rdf.type", v, template)?;
                        kind = match t.as_str() {
                            "file" => RdfSourceKind::File,
                            "string" => RdfSourceKind::Str,
                            "inline" => RdfSourceKind::Inline,
                            other => {
                                return Err(TemplateError::Frontmatter {
                                    template: template.to_string(),
                                    message: format!("unknown rdf type '{}'", other),
                                })
                            }
                        };
                    }
                    "format" => format = Some(expect_string("rdf.format", v, template)?),
                    other => {
                        return Err(TemplateError::Frontmatter {
                            template: template.to_string(),
                            message: format!("unknown rdf key '{}'", other),
                        })
                    }
                }
            }
            Ok(RdfBinding {
                source: source.ok_or_else(|| TemplateError::Frontmatter {
                    template: template.to_string(),
                    message: "rdf directive requires a source".to_string(),
                })?,
                kind,
                format,
            })
        }
        other => Err(TemplateError::Frontmatter {
            template: template.to_string(),
            message: format!("'rdf' must be a string or mapping, got {:?}", other),
        }),
    }
}
