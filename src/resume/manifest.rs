//! Artifacts manifest persistence
//!
//! File format (`.artifacts_manifest.json`):
//!
//! ```json
//! { "<account id>": { "<resource>:<artifact id>": "<sha256 hex>" } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::output::atomic_write;

/// Manifest errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// IO error
    #[error("manifest IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("manifest serialization error: {0}")]
    SerializationError(String),
}

/// Last known fingerprint of every artifact, per account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactsManifest {
    accounts: BTreeMap<String, BTreeMap<String, String>>,
}

impl ArtifactsManifest {
    /// Empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`; missing or unreadable files yield an empty manifest
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(manifest)) => {
                debug!(
                    path = %path.display(),
                    artifacts = manifest.len(),
                    "Loaded artifacts manifest"
                );
                manifest
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Failed to load artifacts manifest {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from `path`, reporting corruption
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn try_load(path: &Path) -> Result<Option<Self>, ManifestError> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ManifestError::IoError(e.to_string())),
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| ManifestError::SerializationError(e.to_string()))
    }

    /// Persist atomically to `path`
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ManifestError::SerializationError(e.to_string()))?;
        atomic_write(path, &json).map_err(|e| {
            ManifestError::IoError(format!("Failed to write {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), artifacts = self.len(), "Saved artifacts manifest");
        Ok(())
    }

    /// `<resource>:<artifact id>`
    pub fn key(resource: &str, artifact_id: &str) -> String {
        format!("{resource}:{artifact_id}")
    }

    /// Recorded fingerprint of an artifact
    pub fn get(&self, account_id: u64, resource: &str, artifact_id: &str) -> Option<&str> {
        self.accounts
            .get(&account_id.to_string())
            .and_then(|entries| entries.get(&Self::key(resource, artifact_id)))
            .map(String::as_str)
    }

    /// Record the fingerprint of an artifact, replacing any previous value
    pub fn record(
        &mut self,
        account_id: u64,
        resource: &str,
        artifact_id: &str,
        hash: impl Into<String>,
    ) {
        self.accounts
            .entry(account_id.to_string())
            .or_default()
            .insert(Self::key(resource, artifact_id), hash.into());
    }

    /// Total number of artifacts across accounts
    pub fn len(&self) -> usize {
        self.accounts.values().map(BTreeMap::len).sum()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Log a short summary of a loaded manifest
pub fn log_manifest_summary(manifest: &ArtifactsManifest) {
    if !manifest.is_empty() {
        info!(
            "Artifacts manifest tracks {} artifact(s) across {} account(s)",
            manifest.len(),
            manifest.accounts.len()
        );
    }
}
