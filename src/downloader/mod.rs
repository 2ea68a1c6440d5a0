//! Backup orchestration and rate limiting
//!
//! # Overview
//!
//! A backup run walks every Harvest account and every endpoint of the
//! [`registry`](crate::registry):
//!
//! 1. **Discovery**: list the token's accounts and attach company data
//! 2. **Endpoints**: singleton, list, per-item and nested files per account
//! 3. **Artifacts**: invoice and estimate PDFs, skipped when their
//!    [`fingerprint`] is unchanged
//! 4. **Rate Limiting**: every API call passes through [`rate_limit::RateLimiter`]
//!
//! # Components
//!
//! - [`executor`] - The run state machine and [`BackupSummary`]
//! - [`rate_limit`] - Sliding-window rate limiter
//! - [`fingerprint`] - Business-data hashes for artifact change detection
//! - [`config`] - Tuning constants and backoff calculation
//!
//! # Error Handling
//!
//! [`BackupError`] covers only what ends a run: discovery failures, an empty
//! account list, authentication failures, local I/O on the accounts list, and
//! operator interrupts. Everything else is logged and the affected endpoint,
//! nested resource or artifact is skipped.

use crate::fetcher::FetcherError;
use crate::output::OutputError;

pub mod config;
pub mod executor;
pub mod fingerprint;
pub mod rate_limit;

pub use executor::{BackupExecutor, BackupSummary};
pub use rate_limit::RateLimiter;

/// Run-level backup errors
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Accounts could not be discovered
    #[error("account discovery failed: {0}")]
    Discovery(FetcherError),

    /// The token was rejected; continuing would fail the same way
    #[error("authentication failed: {0}")]
    Authentication(FetcherError),

    /// The token sees no Harvest accounts
    #[error("no Harvest accounts found")]
    NoAccounts,

    /// Local write failure outside any single endpoint
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Operator asked to stop
    #[error("backup interrupted")]
    Interrupted,
}

impl BackupError {
    /// Whether the run ended because the token was rejected
    pub fn is_authentication(&self) -> bool {
        match self {
            BackupError::Authentication(_) => true,
            BackupError::Discovery(e) => e.is_authentication(),
            _ => false,
        }
    }

    /// HTTP status behind the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BackupError::Authentication(e) | BackupError::Discovery(e) => e.status(),
            _ => None,
        }
    }
}
