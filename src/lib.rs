//! # Harvest Backup Library
//!
//! Incremental backup of every Harvest time-tracking account reachable with a
//! personal access token. Each resource type (clients, projects, time entries,
//! invoices, ...) is pulled through the paginated Harvest API v2 and written to
//! local disk as JSON, with invoice and estimate PDFs stored alongside.
//!
//! ## Features
//!
//! - **Rate Limiting**: A sliding-window limiter keeps requests inside the API quota
//! - **Retry/Backoff**: Transient failures (429, 5xx, network) are retried with exponential backoff
//! - **Pagination**: One item stream regardless of the response envelope shape
//! - **Atomic Writes**: Every file is written to a temp file and renamed into place
//! - **Incremental PDFs**: A persistent manifest skips artifacts whose business data is unchanged
//!
//! ## Quick Start
//!
//! ```no_run
//! use harvest_backup::downloader::BackupExecutor;
//! use harvest_backup::fetcher::harvest_http::{ClientConfig, HarvestHttpClient};
//! use harvest_backup::output::writer::BackupWriter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HarvestHttpClient::from_config(ClientConfig::new("my-token"))?;
//! let writer = BackupWriter::new("./backup")?;
//!
//! let summary = BackupExecutor::new(client, writer).backup_all().await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`registry`] - Static table of backed-up endpoints
//! - [`fetcher`] - HTTP access layer: transport, retry policy, pagination, account discovery
//! - [`downloader`] - Backup orchestration, rate limiting and change fingerprints
//! - [`output`] - Deterministic on-disk layout and atomic writers
//! - [`resume`] - Artifacts manifest enabling incremental runs

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CLI command implementations
pub mod cli;

/// Backup orchestration
pub mod downloader;

/// Harvest API access layer
pub mod fetcher;

/// Metrics emission
pub mod metrics;

/// Output layout and writers
pub mod output;

/// Endpoint registry
pub mod registry;

/// Incremental backup state
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use downloader::{BackupError, BackupExecutor, BackupSummary};
pub use fetcher::{FetcherError, FetcherResult};
pub use output::writer::BackupWriter;

/// Product an account belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    /// Harvest time tracking (the only product that is backed up)
    Harvest,
    /// Forecast scheduling
    Forecast,
    /// Any product this tool does not know about
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Product::Harvest => "harvest",
            Product::Forecast => "forecast",
            Product::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// An account reachable with the current access token
///
/// Created by account discovery. `company_data` and `subdomain` are attached
/// once, right after discovery, and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Harvest account id (sent as the `Harvest-Account-Id` header)
    pub id: u64,
    /// Display name of the account
    pub name: String,
    /// Product the account belongs to
    pub product: Product,
    /// Raw `/v2/company` payload for this account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_data: Option<Value>,
    /// Subdomain used to build public client-link URLs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

impl Account {
    /// Create an account without company data
    pub fn new(id: u64, name: impl Into<String>, product: Product) -> Self {
        Self {
            id,
            name: name.into(),
            product,
            company_data: None,
            subdomain: None,
        }
    }

    /// Attach a subdomain (builder style, mostly useful in tests)
    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// Whether this account is backed up at all
    pub fn is_harvest(&self) -> bool {
        self.product == Product::Harvest
    }

    /// The `{id, name, product}` summary written to `accounts.json`
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "product": self.product,
        })
    }
}

/// User returned alongside the account list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUser {
    /// User id
    pub id: u64,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
    /// Email address
    #[serde(default)]
    pub email: String,
}

/// Response body of the accounts-discovery endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsResponse {
    /// The authenticated user
    pub user: AccountUser,
    /// Every account visible to the token, all products included
    pub accounts: Vec<Account>,
}
