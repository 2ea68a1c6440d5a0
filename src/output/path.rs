//! Deterministic on-disk layout
//!
//! ```text
//! <root>/accounts.json
//! <root>/.artifacts_manifest.json
//! <root>/harvest_account_<id>/<resource>/list.json | data.json
//! <root>/harvest_account_<id>/<resource>/<item id>.json
//! <root>/harvest_account_<id>/<resource>/<parent id>_<nested name>.json
//! <root>/harvest_account_<id>/<resource>/artifacts/<item id>.pdf
//! ```

use std::path::{Path, PathBuf};

use super::{OutputError, OutputResult};

/// Account summary file name
pub const ACCOUNTS_FILE: &str = "accounts.json";

/// Artifacts manifest file name
pub const MANIFEST_FILE: &str = ".artifacts_manifest.json";

/// Subdirectory holding binary artifacts
pub const ARTIFACTS_DIR: &str = "artifacts";

/// File holding a full listing
pub const LIST_FILE: &str = "list.json";

/// File holding a singleton resource
pub const DATA_FILE: &str = "data.json";

/// Prefix of per-account directories
pub const ACCOUNT_DIR_PREFIX: &str = "harvest_account_";

/// Paths inside one backup root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLayout {
    root: PathBuf,
}

impl BackupLayout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Backup root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/accounts.json`
    pub fn accounts_file(&self) -> PathBuf {
        self.root.join(ACCOUNTS_FILE)
    }

    /// `<root>/.artifacts_manifest.json`
    pub fn manifest_file(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// `<root>/harvest_account_<id>`
    pub fn account_dir(&self, account_id: u64) -> PathBuf {
        self.root.join(format!("{ACCOUNT_DIR_PREFIX}{account_id}"))
    }

    /// `<root>/harvest_account_<id>/<resource>`
    pub fn resource_dir(&self, account_id: u64, resource: &str) -> OutputResult<PathBuf> {
        Ok(self.account_dir(account_id).join(component(resource)?))
    }

    /// `<root>/harvest_account_<id>/<resource>/artifacts`
    pub fn artifacts_dir(&self, account_id: u64, resource: &str) -> OutputResult<PathBuf> {
        Ok(self.resource_dir(account_id, resource)?.join(ARTIFACTS_DIR))
    }

    /// Destination of a JSON file
    pub fn json_path(&self, account_id: u64, resource: &str, filename: &str) -> OutputResult<PathBuf> {
        Ok(self
            .resource_dir(account_id, resource)?
            .join(component(filename)?))
    }

    /// Destination of a binary artifact
    pub fn artifact_path(
        &self,
        account_id: u64,
        resource: &str,
        filename: &str,
    ) -> OutputResult<PathBuf> {
        Ok(self
            .artifacts_dir(account_id, resource)?
            .join(component(filename)?))
    }
}

/// `<id>.json`
pub fn item_filename(item_id: u64) -> String {
    format!("{item_id}.json")
}

/// `<parent id>_<nested name>.json`
pub fn nested_filename(parent_id: u64, nested_name: &str) -> String {
    format!("{parent_id}_{nested_name}.json")
}

/// `<id>.pdf`
pub fn pdf_filename(item_id: u64) -> String {
    format!("{item_id}.pdf")
}

// A single, non-traversing path segment
fn component(name: &str) -> OutputResult<&str> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(OutputError::InvalidComponent(name.to_string()));
    }
    Ok(name)
}
