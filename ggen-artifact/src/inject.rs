//! Injection write modes
//!
//! Pure string surgery for inject/append/prepend/lineAt. Idempotent: a
//! block that is already present in the target leaves the file unchanged.

use crate::error::{ArtifactError, ArtifactResult};
use ggen_template::OperationMode;

/// Outcome of applying an injection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// New full content of the file
    Applied(String),
    /// The rendered block is already present; nothing to write
    AlreadyPresent,
}

/// Apply an injection mode to the existing content.
///
/// `path` is used for error messages only.
pub fn apply(
    existing: &str,
    block: &str,
    mode: OperationMode,
    before: Option<&str>,
    after: Option<&str>,
    path: &str,
) -> ArtifactResult<InjectionOutcome> {
    let needle = block.trim_end_matches('\n');
    if !needle.is_empty() && existing.contains(needle) {
        return Ok(InjectionOutcome::AlreadyPresent);
    }

    let block = ensure_trailing_newline(block);
    let content = match mode {
        OperationMode::Write => block,
        OperationMode::Append => {
            let mut out = ensure_trailing_newline(existing);
            out.push_str(&block);
            out
        }
        OperationMode::Prepend => {
            let mut out = block;
            out.push_str(existing);
            out
        }
        OperationMode::LineAt(line) => insert_at_line(existing, &block, line),
        OperationMode::Inject => inject_at_anchor(existing, &block, before, after, path)?,
    };
    Ok(InjectionOutcome::Applied(content))
}

fn ensure_trailing_newline(s: &str) -> String {
    if s.is_empty() || s.ends_with('\n') {
        s.to_string()
    } else {
        format!("{}\n", s)
    }
}

/// Insert at a 1-based line; past-the-end inserts at the end.
fn insert_at_line(existing: &str, block: &str, line: u64) -> String {
    let lines: Vec<&str> = existing.split_inclusive('\n').collect();
    let index = (line.saturating_sub(1) as usize).min(lines.len());

    let mut out = String::with_capacity(existing.len() + block.len());
    for l in &lines[..index] {
        out.push_str(l);
    }
    // Make sure the preceding line is terminated before inserting
    if index > 0 && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(block);
    for l in &lines[index..] {
        out.push_str(l);
    }
    out
}

/// Insert before/after the first line containing the anchor text.
fn inject_at_anchor(
    existing: &str,
    block: &str,
    before: Option<&str>,
    after: Option<&str>,
    path: &str,
) -> ArtifactResult<String> {
    let (anchor, insert_before) = match (before, after) {
        (Some(a), _) => (a, true),
        (None, Some(a)) => (a, false),
        (None, None) => {
            return Err(ArtifactError::AnchorNotFound {
                anchor: "<missing>".to_string(),
                path: path.to_string(),
            })
        }
    };

    let lines: Vec<&str> = existing.split_inclusive('\n').collect();
    let position = lines
        .iter()
        .position(|l| l.contains(anchor))
        .ok_or_else(|| ArtifactError::AnchorNotFound {
            anchor: anchor.to_string(),
            path: path.to_string(),
        })?;

    let split = if insert_before { position } else { position + 1 };
    let mut out = String::with_capacity(existing.len() + block.len());
    for l in &lines[..split] {
        out.push_str(l);
    }
    if split > 0 && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(block);
    for l in &lines[split..] {
        out.push_str(l);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "line one\n// imports\nline three\n";

    #[test]
    fn test_append() {
        let out = apply(FILE, "new line", OperationMode::Append, None, None, "f").unwrap();
        assert_eq!(
            out,
            InjectionOutcome::Applied("line one\n// imports\nline three\nnew line\n".to_string())
        );
    }

    #[test]
    fn test_prepend() {
        let out = apply(FILE, "header", OperationMode::Prepend, None, None, "f").unwrap();
        assert_eq!(
            out,
            InjectionOutcome::Applied("header\nline one\n// imports\nline three\n".to_string())
        );
    }

    #[test]
    fn test_inject_after_anchor() {
        let out = apply(
            FILE,
            "use std::fs;",
            OperationMode::Inject,
            None,
            Some("// imports"),
            "f",
        )
        .unwrap();
        assert_eq!(
            out,
            InjectionOutcome::Applied(
                "line one\n// imports\nuse std::fs;\nline three\n".to_string()
            )
        );
    }

    #[test]
    fn test_inject_before_anchor() {
        let out = apply(
            FILE,
            "use std::fs;",
            OperationMode::Inject,
            Some("// imports"),
            None,
            "f",
        )
        .unwrap();
        assert_eq!(
            out,
            InjectionOutcome::Applied(
                "line one\nuse std::fs;\n// imports\nline three\n".to_string()
            )
        );
    }

    #[test]
    fn test_inject_missing_anchor_errors() {
        let err = apply(
            FILE,
            "x",
            OperationMode::Inject,
            Some("// nope"),
            None,
            "f",
        )
        .unwrap_err();
        assert!(err.to_string().contains("// nope"));
    }

    #[test]
    fn test_line_at_one_based() {
        let out = apply(FILE, "inserted", OperationMode::LineAt(2), None, None, "f").unwrap();
        assert_eq!(
            out,
            InjectionOutcome::Applied("line one\ninserted\n// imports\nline three\n".to_string())
        );
    }

    #[test]
    fn test_line_at_past_end_appends() {
        let out = apply(FILE, "tail", OperationMode::LineAt(99), None, None, "f").unwrap();
        assert_eq!(
            out,
            InjectionOutcome::Applied("line one\n// imports\nline three\ntail\n".to_string())
        );
    }

    #[test]
    fn test_idempotent_injection() {
        let existing = "line one\nuse std::fs;\nline three\n";
        let out = apply(
            existing,
            "use std::fs;",
            OperationMode::Inject,
            None,
            Some("line one"),
            "f",
        )
        .unwrap();
        assert_eq!(out, InjectionOutcome::AlreadyPresent);
    }
}
