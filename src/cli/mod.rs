//! CLI command implementations

pub mod backup;
pub mod error;

pub use backup::Cli;
pub use error::{CliError, EXIT_AUTH_FAILURE, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS};
