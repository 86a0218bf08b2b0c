//! Baseline store
//!
//! A single JSON file mapping `hash(resolved path)` to the recorded state
//! of each tracked file. Loaded at startup, rewritten atomically on any
//! update. Used by drift detection when no attestation is present.

use crate::error::{DriftError, DriftResult};
use ggen_artifact::clock::SharedTimeSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Recorded state of one tracked file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineEntry {
    /// Original (tracked) path
    pub path: String,
    /// SHA-256 of the recorded bytes
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Full content, kept when the store is configured to retain it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The persisted baseline map
pub struct BaselineStore {
    file_path: PathBuf,
    entries: BTreeMap<String, BaselineEntry>,
    keep_content: bool,
    time: SharedTimeSource,
}

impl std::fmt::Debug for BaselineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineStore")
            .field("file_path", &self.file_path)
            .field("entries", &self.entries)
            .field("keep_content", &self.keep_content)
            .finish()
    }
}

impl BaselineStore {
    /// Load the store; a missing file yields an empty store, a malformed
    /// one aborts with `baseline-corrupt`.
    pub fn load(file_path: PathBuf, keep_content: bool, time: SharedTimeSource) -> DriftResult<Self> {
        let entries = match std::fs::read(&file_path) {
            Err(_) => BTreeMap::new(),
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| DriftError::BaselineCorrupt {
                    path: file_path.display().to_string(),
                    message: e.to_string(),
                })?
            }
        };
        Ok(Self {
            file_path,
            entries,
            keep_content,
            time,
        })
    }

    /// Key of a tracked path: hash of its resolved absolute form
    pub fn key_of(path: &Path) -> String {
        let resolved = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        ggen_hash::hash_bytes(resolved.to_string_lossy().as_bytes())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&BaselineEntry> {
        self.entries.get(&Self::key_of(path))
    }

    /// Sorted iteration over tracked entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BaselineEntry)> + '_ {
        self.entries.iter()
    }

    /// Record the current content of a file. Does not persist; call
    /// [`BaselineStore::save`] afterwards.
    pub fn record(&mut self, path: &Path) -> DriftResult<&BaselineEntry> {
        let bytes = std::fs::read(path).map_err(|e| DriftError::WriteFailed {
            path: path.display().to_string(),
            message: format!("cannot read tracked file: {}", e),
        })?;
        let key = Self::key_of(path);
        let entry = BaselineEntry {
            path: path.display().to_string(),
            hash: ggen_hash::hash_bytes(&bytes),
            timestamp: self.time.now_iso8601(),
            content: if self.keep_content {
                String::from_utf8(bytes).ok()
            } else {
                None
            },
        };
        self.entries.insert(key.clone(), entry);
        self.entries
            .get(&key)
            .ok_or_else(|| DriftError::BaselineCorrupt {
                path: self.file_path.display().to_string(),
                message: "entry vanished after insert".to_string(),
            })
    }

    pub fn remove(&mut self, path: &Path) -> Option<BaselineEntry> {
        self.entries.remove(&Self::key_of(path))
    }

    /// Persist atomically (temp + rename) as canonical JSON.
    pub fn save(&self) -> DriftResult<()> {
        let value: Value =
            serde_json::to_value(&self.entries).map_err(|e| DriftError::BaselineCorrupt {
                path: self.file_path.display().to_string(),
                message: e.to_string(),
            })?;
        let bytes = ggen_hash::canonical_json(&value).into_bytes();
        ggen_artifact::generator::atomic_write(&self.file_path, &bytes).map_err(|e| {
            DriftError::WriteFailed {
                path: self.file_path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        tracing::debug!(
            baseline = %self.file_path.display(),
            entries = self.entries.len(),
            "baseline saved"
        );
        Ok(())
    }
}
