//! Engine configuration
//!
//! Loaded from a TOML file with defaults for every field. No environment
//! variable may influence generated bytes; env is reserved for logging.

use crate::error::{EngineError, EngineResult};
use ggen_drift::DriftMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hard cap on the worker pool
pub const MAX_PARALLELISM_CAP: usize = 8;

/// Attestation variables policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariablesPolicy {
    #[default]
    Embed,
    HashOnly,
}

/// The engine's configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Worker pool size; defaults to the core count, capped at 8
    pub max_parallelism: usize,
    /// LRU bound on compiled shapes graphs
    pub shapes_cache_size: usize,
    /// Rendered-body cache size
    pub render_cache_size: usize,
    /// Above this many blank nodes, graph hashing is refused
    pub blank_node_threshold: usize,
    /// fail | warn | fix
    pub drift_mode: DriftMode,
    /// embed | hash-only
    pub variables_policy: VariablesPolicy,
    /// Deterministic mode: fixed time source, timestamps omitted
    pub deterministic: bool,
    /// Fixed ISO-8601 timestamp for non-omitted deterministic stamps
    pub fixed_timestamp: Option<String>,
    /// Baseline file location
    pub baseline_path: PathBuf,
    /// Keep full file content in the baseline
    pub baseline_content: bool,
    /// Back up originals before fix-mode rewrites
    pub backup_on_fix: bool,
    /// Reject unknown frontmatter directives
    pub strict_frontmatter: bool,
    /// Graph-size rule bound
    pub max_graph_triples: usize,
    /// Per-call SHACL deadline in milliseconds
    pub validation_timeout_ms: Option<u64>,
    /// Attempt re-render from attestation provenance during drift checks
    pub attempt_regeneration: bool,
    /// Output root for generated artifacts
    pub output_root: PathBuf,
    /// Build-environment stub passed to templates (from the plan, not the
    /// host)
    pub build_env: HashMap<String, serde_json::Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: default_parallelism(),
            shapes_cache_size: 64,
            render_cache_size: 256,
            blank_node_threshold: 128,
            drift_mode: DriftMode::Fail,
            variables_policy: VariablesPolicy::Embed,
            deterministic: true,
            fixed_timestamp: None,
            baseline_path: PathBuf::from(".ggen-baseline.json"),
            baseline_content: true,
            backup_on_fix: true,
            strict_frontmatter: true,
            max_graph_triples: 1_000_000,
            validation_timeout_ms: None,
            attempt_regeneration: true,
            output_root: PathBuf::from("."),
            build_env: HashMap::new(),
        }
    }
}

fn default_parallelism() -> usize {
    num_cpus::get().clamp(1, MAX_PARALLELISM_CAP)
}

impl EngineConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> EngineResult<EngineConfig> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => return Ok(EngineConfig::default()),
        };
        let config: EngineConfig = toml::from_str(&text).map_err(|e| EngineError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity checks beyond what serde enforces
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_parallelism == 0 {
            return Err(EngineError::Config {
                message: "max_parallelism must be at least 1".to_string(),
            });
        }
        if self.max_parallelism > MAX_PARALLELISM_CAP {
            return Err(EngineError::Config {
                message: format!("max_parallelism is capped at {}", MAX_PARALLELISM_CAP),
            });
        }
        if self.shapes_cache_size == 0 {
            return Err(EngineError::Config {
                message: "shapes_cache_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert!(config.max_parallelism >= 1);
        assert!(config.max_parallelism <= MAX_PARALLELISM_CAP);
        assert!(config.deterministic);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = EngineConfig::load(Path::new("/nonexistent/ggen.toml")).unwrap();
        assert_eq!(config.shapes_cache_size, 64);
    }

    #[test]
    fn test_load_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ggen.toml");
        std::fs::write(
            &path,
            r#"
max_parallelism = 2
drift_mode = "warn"
baseline_content = false
"#,
        )
        .unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.max_parallelism, 2);
        assert_eq!(config.drift_mode, DriftMode::Warn);
        assert!(!config.baseline_content);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ggen.toml");
        std::fs::write(&path, "bogus_key = 1\n").unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    fn test_excessive_parallelism_rejected() {
        let mut config = EngineConfig::default();
        config.max_parallelism = 64;
        assert!(config.validate().is_err());
    }
}
