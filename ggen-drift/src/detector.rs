//! Drift detector
//!
//! `detect` compares current bytes against the expected state (explicit
//! parameter, adjacent attestation, or persisted baseline, in that
//! priority), classifies the difference and scores its significance.
//! `fix` restores drifted files from a regeneration or the baseline.

use crate::baseline::BaselineEntry;
use crate::classify;
use crate::error::{DriftError, DriftResult as OpResult};
use ggen_artifact::Attestation;
use ggen_graph::GraphFormat;
use ggen_template::{RenderContext, Template, TemplateEngine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Drift classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftType {
    Unchanged,
    /// Byte-level difference with identical semantic content
    Cosmetic,
    Semantic,
    Deleted,
    /// Drifted, but regeneration reproduces the expected bytes
    Regenerated,
}

/// Drift severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriftSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// How detected drift is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftMode {
    /// Non-unchanged results propagate as failures
    #[default]
    Fail,
    /// Results are reported, overall status stays success
    Warn,
    /// Drifted files are replaced by regeneration or baseline content
    Fix,
}

/// Expected state supplied explicitly by the caller
#[derive(Debug, Clone)]
pub struct ExpectedState {
    pub hash: String,
    pub content: Option<Vec<u8>>,
}

/// Detector configuration
#[derive(Debug, Clone)]
pub struct DriftDetectorConfig {
    pub mode: DriftMode,
    /// Attempt re-render when the attestation carries full provenance
    pub attempt_regeneration: bool,
    /// Back up originals as `{path}.bak` before fixing
    pub backup_on_fix: bool,
    /// Strict frontmatter when reloading templates for regeneration
    pub strict_frontmatter: bool,
}

impl Default for DriftDetectorConfig {
    fn default() -> Self {
        Self {
            mode: DriftMode::Fail,
            attempt_regeneration: true,
            backup_on_fix: true,
            strict_frontmatter: true,
        }
    }
}

/// Action taken by fix mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixAction {
    Regenerated,
    RestoredFromBaseline,
    NothingToFix,
}

/// Result of one detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftResult {
    pub path: String,
    pub drift_type: DriftType,
    pub severity: DriftSeverity,
    /// Weighted significance in [0, 1]
    pub significance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_hash: Option<String>,
    pub details: Vec<String>,
    /// Bytes a fix would write: regeneration output
    #[serde(skip)]
    pub regenerated: Option<Vec<u8>>,
    /// Bytes a fix would fall back to: expected content
    #[serde(skip)]
    pub expected_content: Option<Vec<u8>>,
}

impl DriftResult {
    pub fn is_drifted(&self) -> bool {
        !matches!(self.drift_type, DriftType::Unchanged | DriftType::Regenerated)
    }
}

/// The detector. Holds the template engine for regeneration attempts.
pub struct DriftDetector {
    config: DriftDetectorConfig,
    engine: Arc<TemplateEngine>,
}

impl DriftDetector {
    pub fn new(config: DriftDetectorConfig, engine: Arc<TemplateEngine>) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &DriftDetectorConfig {
        &self.config
    }

    /// Detect drift for one tracked path.
    ///
    /// `baseline` is the entry for this path, pre-fetched by the caller so
    /// no store lock is held across this call's file I/O.
    pub fn detect(
        &self,
        path: &Path,
        expected: Option<&ExpectedState>,
        baseline: Option<&BaselineEntry>,
    ) -> OpResult<DriftResult> {
        let path_str = path.display().to_string();

        // Resolve the expected side first so a deleted file can still
        // report what it was expected to be.
        let resolved = self.resolve_expected(path, expected, baseline)?;

        let current = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => {
                return Ok(DriftResult {
                    path: path_str,
                    drift_type: DriftType::Deleted,
                    severity: DriftSeverity::Critical,
                    significance: 1.0,
                    expected_hash: resolved.as_ref().map(|r| r.hash.clone()),
                    current_hash: None,
                    details: vec!["tracked file no longer exists".to_string()],
                    regenerated: None,
                    expected_content: resolved.and_then(|r| r.content),
                });
            }
        };
        let current_hash = ggen_hash::hash_bytes(&current);

        let resolved = resolved.ok_or_else(|| DriftError::NoExpectedState {
            path: path_str.clone(),
        })?;

        if current_hash == resolved.hash {
            return Ok(DriftResult {
                path: path_str,
                drift_type: DriftType::Unchanged,
                severity: DriftSeverity::Low,
                significance: 0.0,
                expected_hash: Some(resolved.hash),
                current_hash: Some(current_hash),
                details: Vec::new(),
                regenerated: None,
                expected_content: resolved.content,
            });
        }

        let (drift_type, significance, details) =
            self.classify_change(path, &current, resolved.content.as_deref());

        let mut result = DriftResult {
            path: path_str,
            drift_type,
            severity: severity_of(significance, drift_type),
            significance,
            expected_hash: Some(resolved.hash.clone()),
            current_hash: Some(current_hash),
            details,
            regenerated: None,
            expected_content: resolved.content,
        };

        // Reclassify when a re-render reproduces the expected bytes.
        if self.config.attempt_regeneration {
            if let Some(attestation) = &resolved.attestation {
                if let Some(bytes) = self.try_regenerate(attestation) {
                    if ggen_hash::hash_bytes(&bytes) == resolved.hash {
                        result.drift_type = DriftType::Regenerated;
                        result.severity = DriftSeverity::Low;
                        result.regenerated = Some(bytes);
                    }
                }
            }
        }

        tracing::debug!(
            path = %result.path,
            drift = ?result.drift_type,
            significance = result.significance,
            "drift detected"
        );
        Ok(result)
    }

    /// Replace a drifted file with regenerated bytes or baseline content.
    pub fn fix(&self, path: &Path, result: &DriftResult) -> OpResult<FixAction> {
        if !result.is_drifted() && result.regenerated.is_none() {
            return Ok(FixAction::NothingToFix);
        }

        let (bytes, action) = match (&result.regenerated, &result.expected_content) {
            (Some(bytes), _) => (bytes.clone(), FixAction::Regenerated),
            (None, Some(content)) => (content.clone(), FixAction::RestoredFromBaseline),
            (None, None) => {
                return Err(DriftError::RegenerationUnavailable {
                    path: path.display().to_string(),
                })
            }
        };

        if self.config.backup_on_fix && path.exists() {
            let backup = std::path::PathBuf::from(format!("{}.bak", path.display()));
            std::fs::copy(path, &backup).map_err(|e| DriftError::WriteFailed {
                path: backup.display().to_string(),
                message: e.to_string(),
            })?;
        }

        ggen_artifact::generator::atomic_write(path, &bytes).map_err(|e| {
            DriftError::WriteFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        tracing::info!(path = %path.display(), action = ?action, "drift fixed");
        Ok(action)
    }

    fn classify_change(
        &self,
        path: &Path,
        current: &[u8],
        expected_content: Option<&[u8]>,
    ) -> (DriftType, f64, Vec<String>) {
        let expected_content = match expected_content {
            Some(bytes) => bytes,
            None => {
                return (
                    DriftType::Semantic,
                    0.5,
                    vec!["expected content unavailable; hash mismatch only".to_string()],
                )
            }
        };

        // RDF-aware pathway when the file's declared format parses on
        // both sides
        if let Some(format) = declared_format(path) {
            if let Some((expected, current)) =
                classify::parse_both(expected_content, current, format)
            {
                let classification = classify::classify_rdf(&expected, &current);
                if classification.identical {
                    return (DriftType::Cosmetic, 0.0, classification.details);
                }
                return (
                    DriftType::Semantic,
                    classification.significance,
                    classification.details,
                );
            }
        }

        // Non-RDF: line-level heuristics
        let expected_text = String::from_utf8_lossy(expected_content);
        let current_text = String::from_utf8_lossy(current);
        let classification = classify::classify_lines(&expected_text, &current_text);
        if classification.significance == 0.0 {
            return (DriftType::Cosmetic, 0.0, classification.details);
        }
        (
            DriftType::Semantic,
            classification.significance,
            classification.details,
        )
    }

    /// Expected state resolution: parameter, then attestation, then baseline.
    fn resolve_expected(
        &self,
        path: &Path,
        expected: Option<&ExpectedState>,
        baseline: Option<&BaselineEntry>,
    ) -> OpResult<Option<ResolvedExpected>> {
        if let Some(state) = expected {
            return Ok(Some(ResolvedExpected {
                hash: state.hash.clone(),
                content: state.content.clone(),
                attestation: None,
            }));
        }

        match Attestation::read_beside(path) {
            Ok(attestation) => {
                return Ok(Some(ResolvedExpected {
                    hash: attestation.artifact.hash.clone(),
                    content: None,
                    attestation: Some(attestation),
                }));
            }
            Err(e) if e.kind() == "no-attestation" => {}
            Err(e) => return Err(DriftError::Artifact(e)),
        }

        if let Some(entry) = baseline {
            return Ok(Some(ResolvedExpected {
                hash: entry.hash.clone(),
                content: entry.content.as_ref().map(|c| c.clone().into_bytes()),
                attestation: None,
            }));
        }

        Ok(None)
    }

    /// Re-render from attestation provenance, when complete.
    fn try_regenerate(&self, attestation: &Attestation) -> Option<Vec<u8>> {
        if !attestation.can_regenerate() {
            return None;
        }
        let template_path = attestation.provenance.template_path.as_deref()?;
        let variables = attestation.provenance.variables.clone()?;

        let template =
            Template::load(Path::new(template_path), self.config.strict_frontmatter).ok()?;
        let context = RenderContext::from_value(variables).ok()?;
        let rendered = self.engine.render_template(&template, &context).ok()?;
        Some(rendered.into_bytes())
    }
}

struct ResolvedExpected {
    hash: String,
    content: Option<Vec<u8>>,
    attestation: Option<Attestation>,
}

/// Severity from significance; deletion is always critical.
fn severity_of(significance: f64, drift_type: DriftType) -> DriftSeverity {
    if drift_type == DriftType::Deleted {
        return DriftSeverity::Critical;
    }
    if significance < 0.05 {
        DriftSeverity::Low
    } else if significance < 0.2 {
        DriftSeverity::Medium
    } else if significance < 0.5 {
        DriftSeverity::High
    } else {
        DriftSeverity::Critical
    }
}

/// Format inferred from the file extension, for the RDF pathway
fn declared_format(path: &Path) -> Option<GraphFormat> {
    let ext = path.extension()?.to_str()?;
    GraphFormat::from_extension(ext).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineStore;
    use ggen_artifact::clock::FixedTime;

    fn detector() -> DriftDetector {
        DriftDetector::new(DriftDetectorConfig::default(), Arc::new(TemplateEngine::new()))
    }

    fn baseline_with(dir: &Path, tracked: &Path) -> BaselineStore {
        let mut store = BaselineStore::load(
            dir.join(".ggen-baseline.json"),
            true,
            Arc::new(FixedTime::at("2024-01-01T00:00:00Z")),
        )
        .unwrap();
        store.record(tracked).unwrap();
        store
    }

    #[test]
    fn test_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, "stable").unwrap();
        let store = baseline_with(dir.path(), &file);

        let result = detector().detect(&file, None, store.get(&file)).unwrap();
        assert_eq!(result.drift_type, DriftType::Unchanged);
        assert_eq!(result.significance, 0.0);
    }

    #[test]
    fn test_deleted_file_is_critical() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, "soon gone").unwrap();
        let store = baseline_with(dir.path(), &file);
        std::fs::remove_file(&file).unwrap();

        let result = detector().detect(&file, None, store.get(&file)).unwrap();
        assert_eq!(result.drift_type, DriftType::Deleted);
        assert_eq!(result.severity, DriftSeverity::Critical);
    }

    #[test]
    fn test_reformatted_turtle_is_cosmetic() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("graph.ttl");
        std::fs::write(
            &file,
            "@prefix ex: <http://example.org/> .\n@prefix foaf: <http://xmlns.com/foaf/0.1/> .\nex:j a foaf:Person .\n",
        )
        .unwrap();
        let store = baseline_with(dir.path(), &file);

        // Reorder prefixes and whitespace without changing the triple set
        std::fs::write(
            &file,
            "@prefix foaf: <http://xmlns.com/foaf/0.1/> .\n@prefix ex: <http://example.org/> .\n\nex:j a foaf:Person .\n",
        )
        .unwrap();

        let result = detector().detect(&file, None, store.get(&file)).unwrap();
        assert_eq!(result.drift_type, DriftType::Cosmetic);
    }

    #[test]
    fn test_added_type_triple_is_semantic() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("graph.ttl");
        std::fs::write(
            &file,
            "@prefix ex: <http://example.org/> .\nex:a ex:p ex:b .\n",
        )
        .unwrap();
        let store = baseline_with(dir.path(), &file);

        std::fs::write(
            &file,
            "@prefix ex: <http://example.org/> .\nex:a ex:p ex:b .\nex:a a ex:Thing .\n",
        )
        .unwrap();

        let result = detector().detect(&file, None, store.get(&file)).unwrap();
        assert_eq!(result.drift_type, DriftType::Semantic);
        assert!(result.significance >= 0.05);
    }

    #[test]
    fn test_explicit_expected_takes_priority() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, "current").unwrap();

        let expected = ExpectedState {
            hash: ggen_hash::hash_bytes(b"current"),
            content: Some(b"current".to_vec()),
        };
        let result = detector().detect(&file, Some(&expected), None).unwrap();
        assert_eq!(result.drift_type, DriftType::Unchanged);
    }

    #[test]
    fn test_no_expected_state_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("orphan.txt");
        std::fs::write(&file, "data").unwrap();
        let err = detector().detect(&file, None, None).unwrap_err();
        assert_eq!(err.kind(), "no-attestation");
    }

    #[test]
    fn test_fix_restores_from_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, "original").unwrap();
        let store = baseline_with(dir.path(), &file);

        std::fs::write(&file, "tampered").unwrap();
        let det = detector();
        let result = det.detect(&file, None, store.get(&file)).unwrap();
        assert!(result.is_drifted());

        let action = det.fix(&file, &result).unwrap();
        assert_eq!(action, FixAction::RestoredFromBaseline);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
        // Backup of the tampered version exists
        assert!(dir.path().join("data.txt.bak").exists());
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(severity_of(0.01, DriftType::Semantic), DriftSeverity::Low);
        assert_eq!(severity_of(0.1, DriftType::Semantic), DriftSeverity::Medium);
        assert_eq!(severity_of(0.3, DriftType::Semantic), DriftSeverity::High);
        assert_eq!(severity_of(0.7, DriftType::Semantic), DriftSeverity::Critical);
        assert_eq!(severity_of(0.0, DriftType::Deleted), DriftSeverity::Critical);
    }
}
