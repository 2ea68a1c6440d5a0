//! Backup output: on-disk layout and writers

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::resume::manifest::ManifestError;

pub mod path;
pub mod writer;

pub use path::BackupLayout;
pub use writer::BackupWriter;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A file or directory name would escape the backup root
    #[error("invalid path component: {0:?}")]
    InvalidComponent(String),

    /// Manifest could not be persisted
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// What a write call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File written (or replaced) at this path
    Written(PathBuf),
    /// Artifact unchanged since the last run; nothing touched
    Skipped,
    /// Dry run: this path would have been written
    DryRun(PathBuf),
}

impl WriteOutcome {
    /// Destination path, unless the write was skipped
    pub fn path(&self) -> Option<&Path> {
        match self {
            WriteOutcome::Written(path) | WriteOutcome::DryRun(path) => Some(path),
            WriteOutcome::Skipped => None,
        }
    }

    /// Whether the write was skipped as unchanged
    pub fn is_skipped(&self) -> bool {
        matches!(self, WriteOutcome::Skipped)
    }

    /// Whether bytes actually reached the disk
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written(_))
    }
}

/// Replace `path` with `contents` atomically
///
/// Writes to a temp file in the destination directory, fsyncs it and renames
/// it over the destination, then fsyncs the directory. Readers see either the
/// old file or the new one. Parent directories are created as needed.
pub fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)?;
    temp_file.write_all(contents)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    // Make the rename itself durable
    if let Ok(dir) = std::fs::File::open(parent_dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}
