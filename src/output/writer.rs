//! Backup file writer
//!
//! Writes JSON documents and binary artifacts into the [`BackupLayout`] with
//! atomic replacement, and owns the artifacts manifest used to skip unchanged
//! artifacts.

use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::path::BackupLayout;
use super::{atomic_write, OutputError, OutputResult, WriteOutcome};
use crate::downloader::config::HASH_DISPLAY_LENGTH;
use crate::downloader::fingerprint::content_hash as sha256_hex;
use crate::resume::manifest::{log_manifest_summary, ArtifactsManifest};

/// Writer for one backup root
#[derive(Debug)]
pub struct BackupWriter {
    layout: BackupLayout,
    manifest: ArtifactsManifest,
    dry_run: bool,
}

impl BackupWriter {
    /// Open a backup root, creating it if needed, and load its manifest
    ///
    /// # Errors
    /// Returns `OutputError::IoError` if the root cannot be created
    pub fn new(root: impl Into<PathBuf>) -> OutputResult<Self> {
        Self::open(root, false)
    }

    /// Open a backup root that is never written to
    ///
    /// The manifest is still read so skip decisions match a real run.
    pub fn dry_run(root: impl Into<PathBuf>) -> Self {
        let layout = BackupLayout::new(root);
        let manifest = ArtifactsManifest::load(&layout.manifest_file());
        Self {
            layout,
            manifest,
            dry_run: true,
        }
    }

    /// Open a backup root, in dry-run mode or not
    pub fn open(root: impl Into<PathBuf>, dry_run: bool) -> OutputResult<Self> {
        if dry_run {
            return Ok(Self::dry_run(root));
        }

        let layout = BackupLayout::new(root);
        std::fs::create_dir_all(layout.root()).map_err(|e| {
            OutputError::IoError(format!(
                "Failed to create output directory {}: {e}",
                layout.root().display()
            ))
        })?;

        let manifest = ArtifactsManifest::load(&layout.manifest_file());
        log_manifest_summary(&manifest);

        Ok(Self {
            layout,
            manifest,
            dry_run: false,
        })
    }

    /// Whether writes are suppressed
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Output layout
    pub fn layout(&self) -> &BackupLayout {
        &self.layout
    }

    /// In-memory manifest
    pub fn manifest(&self) -> &ArtifactsManifest {
        &self.manifest
    }

    /// Write `data` as pretty-printed JSON to
    /// `<root>/harvest_account_<id>/<resource>/<filename>`
    ///
    /// # Errors
    /// Serialization and I/O failures are returned, never swallowed.
    pub fn write_json<T>(
        &self,
        account_id: u64,
        resource: &str,
        filename: &str,
        data: &T,
    ) -> OutputResult<WriteOutcome>
    where
        T: Serialize + ?Sized,
    {
        let path = self.layout.json_path(account_id, resource, filename)?;
        if self.dry_run {
            debug!("Would write JSON: {}", path.display());
            return Ok(WriteOutcome::DryRun(path));
        }

        let json = serde_json::to_vec_pretty(data)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        write_file(&path, &json)?;
        debug!("Wrote JSON: {}", path.display());
        Ok(WriteOutcome::Written(path))
    }

    /// Write a binary artifact unless it is unchanged
    ///
    /// `content_hash` defaults to the SHA-256 of `content`. When the file
    /// exists and the manifest already records the same hash, nothing is
    /// written and [`WriteOutcome::Skipped`] is returned. Otherwise the file
    /// is replaced and the manifest updated and persisted.
    pub fn write_binary(
        &mut self,
        account_id: u64,
        resource: &str,
        artifact_id: &str,
        filename: &str,
        content: &[u8],
        content_hash: Option<&str>,
    ) -> OutputResult<WriteOutcome> {
        let path = self.layout.artifact_path(account_id, resource, filename)?;
        let hash = match content_hash {
            Some(hash) => hash.to_string(),
            None => sha256_hex(content),
        };

        if path.exists() {
            match self.manifest.get(account_id, resource, artifact_id) {
                Some(existing) if existing == hash => {
                    debug!(
                        "Skipping artifact (unchanged): {} (hash: {}...)",
                        path.display(),
                        short(&hash)
                    );
                    return Ok(WriteOutcome::Skipped);
                }
                Some(existing) => debug!(
                    "Artifact changed: {} (old hash: {}..., new hash: {}...)",
                    path.display(),
                    short(existing),
                    short(&hash)
                ),
                None => debug!("Artifact not in manifest: {}", path.display()),
            }
        } else {
            debug!("Artifact does not exist: {} (will write)", path.display());
        }

        if self.dry_run {
            debug!("Would write artifact: {}", path.display());
            return Ok(WriteOutcome::DryRun(path));
        }

        write_file(&path, content)?;
        // The in-memory manifest only changes once the new one is on disk.
        let mut manifest = self.manifest.clone();
        manifest.record(account_id, resource, artifact_id, hash.clone());
        manifest.save(&self.layout.manifest_file())?;
        self.manifest = manifest;

        debug!(
            "Saved artifact: {} ({} bytes, hash: {}...)",
            path.display(),
            content.len(),
            short(&hash)
        );
        Ok(WriteOutcome::Written(path))
    }

    /// Whether an artifact must be (re)fetched
    ///
    /// False only when the file exists and the manifest records exactly
    /// `content_hash` for it. Has no side effects.
    pub fn should_download_binary(
        &self,
        account_id: u64,
        resource: &str,
        artifact_id: &str,
        filename: &str,
        content_hash: &str,
    ) -> bool {
        let Ok(path) = self.layout.artifact_path(account_id, resource, filename) else {
            return true;
        };
        if !path.exists() {
            return true;
        }
        self.manifest.get(account_id, resource, artifact_id) != Some(content_hash)
    }

    /// Write `<root>/accounts.json` as `{"accounts": [...]}`
    pub fn write_accounts_list(&self, accounts: &[Value]) -> OutputResult<WriteOutcome> {
        let path = self.layout.accounts_file();
        if self.dry_run {
            debug!("Would write accounts list: {}", path.display());
            return Ok(WriteOutcome::DryRun(path));
        }

        let json = serde_json::to_vec_pretty(&json!({ "accounts": accounts }))
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        write_file(&path, &json)?;
        debug!("Wrote accounts list: {}", path.display());
        Ok(WriteOutcome::Written(path))
    }
}

fn write_file(path: &Path, contents: &[u8]) -> OutputResult<()> {
    atomic_write(path, contents)
        .map_err(|e| OutputError::IoError(format!("Failed to write {}: {e}", path.display())))
}

fn short(hash: &str) -> &str {
    hash.get(..HASH_DISPLAY_LENGTH).unwrap_or(hash)
}
