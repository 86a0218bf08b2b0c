//! Lockfile
//!
//! An ordered, hashed plan that guarantees reproducibility across runs:
//! every entry records the template hash, the context hash and the expected
//! content hash; regeneration must reproduce the hashes exactly.

use crate::error::{ArtifactError, ArtifactResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One template entry in the lockfile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub template_path: String,
    /// SHA-256 of the raw template text
    pub template_hash: String,
    /// Canonical-JSON hash of the entry's context
    pub context_hash: String,
    /// Final output path, relative to the output root
    pub output_path: String,
    /// Hash regeneration must reproduce
    pub expected_content_hash: String,
}

/// The lockfile document. Entries are keyed by id; `BTreeMap` keeps the
/// serialized order lexicographic and stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub engine_version: String,
    /// Hash of the merged per-entry contexts, keyed by entry id
    pub context_hash: String,
    pub templates: BTreeMap<String, LockEntry>,
}

impl Lockfile {
    /// Canonical JSON bytes
    pub fn to_canonical_bytes(&self) -> ArtifactResult<Vec<u8>> {
        let value = serde_json::to_value(self).map_err(|e| ArtifactError::LockfileCorrupt {
            message: e.to_string(),
        })?;
        Ok(ggen_hash::canonical_json(&value).into_bytes())
    }

    /// Write atomically
    pub fn write(&self, path: &Path) -> ArtifactResult<()> {
        let bytes = self.to_canonical_bytes()?;
        crate::generator::atomic_write(path, &bytes)
    }

    /// Read and parse; missing or malformed files abort the run
    pub fn read(path: &Path) -> ArtifactResult<Lockfile> {
        let bytes = std::fs::read(path).map_err(|_| ArtifactError::FileNotFound {
            path: path.display().to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ArtifactError::LockfileCorrupt {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lockfile {
        let mut templates = BTreeMap::new();
        templates.insert(
            "e1".to_string(),
            LockEntry {
                template_path: "hello.tmpl".to_string(),
                template_hash: "aa".repeat(32),
                context_hash: "bb".repeat(32),
                output_path: "hello.txt".to_string(),
                expected_content_hash: "cc".repeat(32),
            },
        );
        Lockfile {
            engine_version: "1.0.0".to_string(),
            context_hash: "dd".repeat(32),
            templates,
        }
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.lock");
        let lockfile = sample();
        lockfile.write(&path).unwrap();
        let back = Lockfile::read(&path).unwrap();
        assert_eq!(back, lockfile);
    }

    #[test]
    fn test_canonical_bytes_sorted() {
        let bytes = sample().to_canonical_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let ctx = text.find("\"contextHash\"").unwrap();
        let eng = text.find("\"engineVersion\"").unwrap();
        let tpl = text.find("\"templates\"").unwrap();
        assert!(ctx < eng && eng < tpl);
    }

    #[test]
    fn test_corrupt_lockfile_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.lock");
        std::fs::write(&path, "{not json").unwrap();
        let err = Lockfile::read(&path).unwrap_err();
        assert_eq!(err.kind(), "baseline-corrupt");
    }
}
