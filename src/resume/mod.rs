//! Incremental backup state
//!
//! The artifacts manifest remembers the fingerprint of every binary artifact
//! written so far, so unchanged PDFs are not downloaded again.

pub mod manifest;

pub use manifest::{ArtifactsManifest, ManifestError};
