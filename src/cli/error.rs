//! CLI error types and exit codes

use crate::downloader::BackupError;
use crate::fetcher::retry::RetryErrorType;
use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// Backup finished
pub const EXIT_SUCCESS: i32 = 0;

/// Any fatal error other than the ones below
pub const EXIT_FAILURE: i32 = 1;

/// The personal access token was rejected
pub const EXIT_AUTH_FAILURE: i32 = 2;

/// Interrupted by the operator (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Backup run failed
    #[error(transparent)]
    Backup(#[from] BackupError),

    /// HTTP client could not be set up
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Output directory could not be prepared
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Backup(BackupError::Interrupted) => EXIT_INTERRUPTED,
            CliError::Backup(e) if e.is_authentication() => EXIT_AUTH_FAILURE,
            _ => EXIT_FAILURE,
        }
    }

    /// What the operator can do about it, if anything specific
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            CliError::Backup(e) if e.is_authentication() => {
                Some(RetryErrorType::AuthFailed(e.status().unwrap_or(401)).suggestion())
            }
            CliError::Backup(BackupError::NoAccounts) => {
                Some("Make sure the token belongs to a user with access to a Harvest account")
            }
            _ => None,
        }
    }
}
