//! Attestation sidecars
//!
//! `{artifact}.attest.json` records the inputs needed to reproduce the
//! artifact: template hash, variables hash, source-graph hash and engine
//! version. The file is canonical JSON and carries a hash over itself.

use crate::error::{ArtifactError, ArtifactResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Sidecar filename suffix
pub const ATTESTATION_SUFFIX: &str = ".attest.json";

/// Attestation schema version
pub const ATTESTATION_VERSION: &str = "1";

/// UUID namespace for deterministic attestation ids (v5 over content hash)
const ID_NAMESPACE: uuid::Uuid = uuid::Uuid::NAMESPACE_OID;

/// Description of the artifact the sidecar belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Path relative to the output root
    pub path: String,
    /// Basename of the artifact
    pub name: String,
    /// SHA-256 of the artifact bytes
    pub hash: String,
    /// Size in bytes
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Inputs needed to reproduce the artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_graph_hash: Option<String>,
    /// Canonical-JSON hash of the variable context
    pub variables_hash: String,
    /// The context itself; omitted under the hash-only policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    pub engine_version: String,
}

/// Hash-chain metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    /// Always `sha256`
    pub hash_algorithm: String,
    /// Position in the run's attestation chain
    pub chain_index: u64,
    /// Attestation hash of the previous entry in the chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
}

/// The sidecar document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub id: String,
    pub version: String,
    /// Omitted in deterministic mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub artifact: ArtifactRecord,
    pub provenance: Provenance,
    pub integrity: Integrity,
    /// Hash over the document with this field removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_hash: Option<String>,
}

/// Result of verifying an artifact against its sidecar
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub verified: bool,
    pub expected_hash: String,
    pub current_hash: String,
}

impl Attestation {
    /// Build an unsealed attestation.
    ///
    /// In deterministic runs (`timestamp == None`) the id is a UUIDv5 over
    /// the content hash so sidecar bytes are reproducible; otherwise v4.
    pub fn new(
        artifact: ArtifactRecord,
        provenance: Provenance,
        chain_index: u64,
        previous_hash: Option<String>,
        timestamp: Option<String>,
    ) -> Attestation {
        let id = if timestamp.is_none() {
            uuid::Uuid::new_v5(&ID_NAMESPACE, artifact.hash.as_bytes()).to_string()
        } else {
            uuid::Uuid::new_v4().to_string()
        };
        Attestation {
            id,
            version: ATTESTATION_VERSION.to_string(),
            timestamp,
            artifact,
            provenance,
            integrity: Integrity {
                hash_algorithm: "sha256".to_string(),
                chain_index,
                previous_hash,
            },
            attestation_hash: None,
        }
    }

    /// Compute and set `attestationHash`.
    pub fn seal(&mut self) -> ArtifactResult<()> {
        self.attestation_hash = None;
        let value = self.to_value()?;
        self.attestation_hash = Some(ggen_hash::hash_json(&value));
        Ok(())
    }

    /// Recompute the self-hash and compare with the recorded one.
    pub fn verify_self(&self) -> ArtifactResult<bool> {
        let recorded = match &self.attestation_hash {
            Some(h) => h.clone(),
            None => return Ok(false),
        };
        let mut unsealed = self.clone();
        unsealed.attestation_hash = None;
        let value = unsealed.to_value()?;
        Ok(ggen_hash::hash_json(&value) == recorded)
    }

    fn to_value(&self) -> ArtifactResult<Value> {
        serde_json::to_value(self).map_err(|e| ArtifactError::WriteFailed {
            path: self.artifact.path.clone(),
            message: e.to_string(),
        })
    }

    /// Canonical JSON bytes of the sealed document
    pub fn to_canonical_bytes(&self) -> ArtifactResult<Vec<u8>> {
        let value = self.to_value()?;
        Ok(ggen_hash::canonical_json(&value).into_bytes())
    }

    /// Sidecar path beside an artifact
    pub fn sidecar_path(artifact_path: &Path) -> PathBuf {
        let mut name = artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(ATTESTATION_SUFFIX);
        artifact_path.with_file_name(name)
    }

    /// Write the sealed sidecar atomically beside the artifact.
    pub fn write_beside(&self, artifact_path: &Path) -> ArtifactResult<PathBuf> {
        let path = Self::sidecar_path(artifact_path);
        let bytes = self.to_canonical_bytes()?;
        crate::generator::atomic_write(&path, &bytes)?;
        tracing::debug!(sidecar = %path.display(), "attestation written");
        Ok(path)
    }

    /// Read the sidecar beside an artifact.
    ///
    /// Missing sidecar is `no-attestation`; a sidecar that fails its own
    /// hash check is corrupt.
    pub fn read_beside(artifact_path: &Path) -> ArtifactResult<Attestation> {
        let path = Self::sidecar_path(artifact_path);
        let bytes = std::fs::read(&path).map_err(|_| ArtifactError::NoAttestation {
            path: artifact_path.display().to_string(),
        })?;
        let attestation: Attestation =
            serde_json::from_slice(&bytes).map_err(|e| ArtifactError::AttestationCorrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if !attestation.verify_self()? {
            return Err(ArtifactError::AttestationCorrupt {
                path: path.display().to_string(),
                message: "attestation hash mismatch".to_string(),
            });
        }
        Ok(attestation)
    }

    /// Verify an artifact on disk against its sidecar.
    pub fn verify_artifact(artifact_path: &Path) -> ArtifactResult<VerifyOutcome> {
        let attestation = Self::read_beside(artifact_path)?;
        let bytes = std::fs::read(artifact_path).map_err(|_| ArtifactError::FileNotFound {
            path: artifact_path.display().to_string(),
        })?;
        let current_hash = ggen_hash::hash_bytes(&bytes);
        Ok(VerifyOutcome {
            verified: current_hash == attestation.artifact.hash,
            expected_hash: attestation.artifact.hash,
            current_hash,
        })
    }

    /// True when the sidecar carries enough provenance to re-render
    pub fn can_regenerate(&self) -> bool {
        self.provenance.template_path.is_some() && self.provenance.variables.is_some()
    }
}
