//! Backup executor
//!
//! Drives one run: discover accounts, write `accounts.json`, then for every
//! account walk the endpoint table in order. Authentication failures end the
//! run; any other failure only costs the endpoint, nested resource or
//! artifact it happened in.

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use tracing::{debug, error, info, warn};

use crate::downloader::config::HASH_DISPLAY_LENGTH;
use crate::downloader::fingerprint::item_fingerprint;
use crate::downloader::BackupError;
use crate::fetcher::accounts::discover_accounts;
use crate::fetcher::{FetcherError, HarvestHttpClient};
use crate::metrics::{record_artifact, record_endpoint, ArtifactOutcome};
use crate::output::path::{item_filename, nested_filename, pdf_filename, DATA_FILE, LIST_FILE};
use crate::output::{BackupWriter, OutputError, WriteOutcome};
use crate::registry::{nested_name, nested_path, EndpointDescriptor, EndpointKind, ENDPOINTS};
use crate::shutdown::SharedShutdown;
use crate::Account;

/// Host suffix of public client links
pub const HARVEST_DOMAIN_SUFFIX: &str = ".harvestapp.com";

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    /// Harvest accounts processed
    pub accounts: usize,
    /// Endpoints that finished without error
    pub endpoints_completed: usize,
    /// Endpoints skipped because of an error
    pub endpoints_failed: usize,
    /// JSON files written (or planned, in a dry run)
    pub json_files: usize,
    /// Artifacts downloaded and written
    pub artifacts_downloaded: usize,
    /// Artifacts skipped because their fingerprint was unchanged
    pub artifacts_unchanged: usize,
    /// Artifacts that failed to download or write
    pub artifacts_failed: usize,
}

impl fmt::Display for BackupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Backed up {} account(s): {} endpoint(s) completed, {} failed, {} JSON file(s); \
             PDFs: {} downloaded, {} unchanged, {} failed",
            self.accounts,
            self.endpoints_completed,
            self.endpoints_failed,
            self.json_files,
            self.artifacts_downloaded,
            self.artifacts_unchanged,
            self.artifacts_failed
        )
    }
}

/// Why one endpoint could not be completed
#[derive(Debug, thiserror::Error)]
enum EndpointError {
    #[error(transparent)]
    Fetch(#[from] FetcherError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("interrupted")]
    Interrupted,
}

/// Orchestrates a full backup run
pub struct BackupExecutor {
    client: HarvestHttpClient,
    writer: BackupWriter,
    endpoints: &'static [EndpointDescriptor],
    shutdown: Option<SharedShutdown>,
    summary: BackupSummary,
}

impl BackupExecutor {
    /// Create an executor over the full endpoint table
    pub fn new(client: HarvestHttpClient, writer: BackupWriter) -> Self {
        Self {
            client,
            writer,
            endpoints: ENDPOINTS,
            shutdown: None,
            summary: BackupSummary::default(),
        }
    }

    /// Restrict the run to another endpoint table
    pub fn with_endpoints(mut self, endpoints: &'static [EndpointDescriptor]) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The writer (and through it, the manifest)
    pub fn writer(&self) -> &BackupWriter {
        &self.writer
    }

    /// Back up every Harvest account
    ///
    /// # Errors
    /// Discovery failures, an empty account list, authentication failures,
    /// failure to write `accounts.json`, and operator interrupts.
    pub async fn backup_all(&mut self) -> Result<BackupSummary, BackupError> {
        info!("Starting backup of all Harvest accounts...");
        self.summary = BackupSummary::default();

        let accounts = discover_accounts(&self.client).await.map_err(|e| {
            error!("Error discovering accounts: {}", e);
            if e.is_authentication() {
                BackupError::Authentication(e)
            } else {
                BackupError::Discovery(e)
            }
        })?;

        if accounts.is_empty() {
            return Err(BackupError::NoAccounts);
        }

        let summaries: Vec<Value> = accounts.iter().map(Account::summary).collect();
        self.writer.write_accounts_list(&summaries)?;

        for account in &accounts {
            self.backup_account(account).await?;
            self.summary.accounts += 1;
        }

        info!("{}", self.summary);
        Ok(self.summary.clone())
    }

    async fn backup_account(&mut self, account: &Account) -> Result<(), BackupError> {
        info!("Backing up account {} ({})...", account.id, account.name);
        debug!(
            "Using subdomain for account {}: {}",
            account.id,
            account.subdomain.as_deref().unwrap_or("<none>")
        );

        let endpoints = self.endpoints;
        for endpoint in endpoints {
            if self.shutdown_requested() {
                return Err(BackupError::Interrupted);
            }

            match self.backup_endpoint(account, endpoint).await {
                Ok(()) => {
                    self.summary.endpoints_completed += 1;
                    record_endpoint(endpoint.name, true);
                }
                Err(EndpointError::Interrupted) => return Err(BackupError::Interrupted),
                Err(EndpointError::Fetch(e)) if e.is_authentication() => {
                    error!(
                        "Authentication failed while backing up {} for account {}: {}",
                        endpoint.name, account.id, e
                    );
                    return Err(BackupError::Authentication(e));
                }
                Err(e) => {
                    error!(
                        "Error backing up {} for account {}: {}",
                        endpoint.name, account.id, e
                    );
                    self.summary.endpoints_failed += 1;
                    record_endpoint(endpoint.name, false);
                }
            }
        }

        info!("Completed backup for account {}", account.id);
        Ok(())
    }

    async fn backup_endpoint(
        &mut self,
        account: &Account,
        endpoint: &EndpointDescriptor,
    ) -> Result<(), EndpointError> {
        debug!("Backing up {} for account {}...", endpoint.name, account.id);

        match endpoint.kind() {
            EndpointKind::Singleton => self.backup_singleton(account, endpoint).await,
            EndpointKind::List => self.backup_list(account, endpoint).await,
        }
    }

    async fn backup_singleton(
        &mut self,
        account: &Account,
        endpoint: &EndpointDescriptor,
    ) -> Result<(), EndpointError> {
        let data = match (&account.company_data, endpoint.is_company()) {
            (Some(company), true) => company.clone(),
            _ => {
                self.until_shutdown(self.client.get_json(endpoint.path, account.id, &[]))
                    .await??
            }
        };

        let outcome = self
            .writer
            .write_json(account.id, endpoint.name, DATA_FILE, &data)?;
        self.count_json(&outcome);
        Ok(())
    }

    async fn backup_list(
        &mut self,
        account: &Account,
        endpoint: &EndpointDescriptor,
    ) -> Result<(), EndpointError> {
        let items: Vec<Value> = self
            .collect(endpoint.path, account.id)
            .await?
            .into_iter()
            .filter(Value::is_object)
            .collect();

        if items.is_empty() {
            debug!("No {} for account {}", endpoint.name, account.id);
            return Ok(());
        }

        let outcome = self
            .writer
            .write_json(account.id, endpoint.name, LIST_FILE, &items)?;
        self.count_json(&outcome);
        info!(
            "Backed up {} {} for account {}",
            items.len(),
            endpoint.name,
            account.id
        );

        if endpoint.has_detail {
            self.write_item_files(account, endpoint, &items);
        }

        if endpoint.has_nested() {
            let ids: BTreeSet<u64> = items.iter().filter_map(item_id).collect();
            self.backup_nested(account, endpoint, &ids).await?;
        }

        if endpoint.has_pdf {
            self.backup_pdfs(account, endpoint, &items).await?;
        }

        Ok(())
    }

    /// One `<id>.json` per item, straight from the list payload
    fn write_item_files(&mut self, account: &Account, endpoint: &EndpointDescriptor, items: &[Value]) {
        for item in items {
            let Some(id) = item_id(item) else {
                continue;
            };
            match self
                .writer
                .write_json(account.id, endpoint.name, &item_filename(id), item)
            {
                Ok(outcome) => self.count_json(&outcome),
                Err(e) => warn!("Error writing {} item {}: {}", endpoint.name, id, e),
            }
        }
    }

    async fn backup_nested(
        &mut self,
        account: &Account,
        endpoint: &EndpointDescriptor,
        ids: &BTreeSet<u64>,
    ) -> Result<(), EndpointError> {
        for template in endpoint.nested_paths {
            let suffix = nested_name(template);

            for &parent_id in ids {
                if self.shutdown_requested() {
                    return Err(EndpointError::Interrupted);
                }

                let path = nested_path(template, parent_id);
                let items = match self.collect(&path, account.id).await {
                    Ok(items) => items,
                    Err(EndpointError::Interrupted) => return Err(EndpointError::Interrupted),
                    Err(EndpointError::Fetch(e)) if e.is_unprocessable() => {
                        debug!(
                            "Skipping nested {} for {}: 422 Unprocessable Entity (expected for non-managers)",
                            path, parent_id
                        );
                        continue;
                    }
                    Err(e) => {
                        warn!("Error backing up nested {} for {}: {}", path, parent_id, e);
                        continue;
                    }
                };

                if items.is_empty() {
                    continue;
                }

                match self.writer.write_json(
                    account.id,
                    endpoint.name,
                    &nested_filename(parent_id, suffix),
                    &items,
                ) {
                    Ok(outcome) => self.count_json(&outcome),
                    Err(e) => warn!("Error writing nested {} for {}: {}", path, parent_id, e),
                }
            }
        }
        Ok(())
    }

    async fn backup_pdfs(
        &mut self,
        account: &Account,
        endpoint: &EndpointDescriptor,
        items: &[Value],
    ) -> Result<(), EndpointError> {
        for item in items {
            let (Some(id), Some(client_key)) = (item_id(item), client_key(item)) else {
                continue;
            };

            if self.shutdown_requested() {
                return Err(EndpointError::Interrupted);
            }

            let Some(subdomain) = account.subdomain.as_deref() else {
                debug!("Skipped PDF (no subdomain): {} {}", endpoint.name, id);
                continue;
            };

            let fingerprint = item_fingerprint(item);
            let artifact_id = id.to_string();
            let filename = pdf_filename(id);

            if !self.writer.should_download_binary(
                account.id,
                endpoint.name,
                &artifact_id,
                &filename,
                &fingerprint,
            ) {
                debug!("Skipped PDF (unchanged): {} {}", endpoint.name, id);
                self.summary.artifacts_unchanged += 1;
                record_artifact(endpoint.name, ArtifactOutcome::Unchanged);
                continue;
            }

            let url = client_link_url(subdomain, endpoint.name, client_key);
            if self.writer.is_dry_run() {
                info!("Would download PDF: {} {} from {}", endpoint.name, id, url);
                continue;
            }

            match self
                .download_pdf(account.id, endpoint.name, &artifact_id, &filename, &url, &fingerprint)
                .await
            {
                Ok(WriteOutcome::Skipped) => {
                    self.summary.artifacts_unchanged += 1;
                    record_artifact(endpoint.name, ArtifactOutcome::Unchanged);
                }
                Ok(_) => {
                    debug!(
                        "Downloaded PDF: {} {} (hash: {}...)",
                        endpoint.name,
                        id,
                        &fingerprint[..HASH_DISPLAY_LENGTH]
                    );
                    self.summary.artifacts_downloaded += 1;
                    record_artifact(endpoint.name, ArtifactOutcome::Downloaded);
                }
                Err(EndpointError::Interrupted) => return Err(EndpointError::Interrupted),
                Err(e) => {
                    warn!("Failed to download PDF for {} {}: {}", endpoint.name, id, e);
                    self.summary.artifacts_failed += 1;
                    record_artifact(endpoint.name, ArtifactOutcome::Failed);
                }
            }
        }
        Ok(())
    }

    async fn download_pdf(
        &mut self,
        account_id: u64,
        resource: &str,
        artifact_id: &str,
        filename: &str,
        url: &str,
        fingerprint: &str,
    ) -> Result<WriteOutcome, EndpointError> {
        let content = self
            .until_shutdown(self.client.download_client_link(url))
            .await??;
        let outcome = self.writer.write_binary(
            account_id,
            resource,
            artifact_id,
            filename,
            &content,
            Some(fingerprint),
        )?;
        Ok(outcome)
    }

    /// Drain a paginated listing, stopping at the first page boundary or
    /// backoff after an interrupt
    async fn collect(&self, path: &str, account_id: u64) -> Result<Vec<Value>, EndpointError> {
        let mut stream = self.client.paginate(path, account_id, &[]);
        let mut items = Vec::new();
        loop {
            if self.shutdown_requested() {
                return Err(EndpointError::Interrupted);
            }
            match self.until_shutdown(stream.next()).await? {
                Some(item) => items.push(item?),
                None => return Ok(items),
            }
        }
    }

    /// Run `fut` unless an interrupt arrives first
    ///
    /// Retries, backoff and limiter waits happen inside the client; the race
    /// cuts them short.
    async fn until_shutdown<F, T>(&self, fut: F) -> Result<T, EndpointError>
    where
        F: Future<Output = T>,
    {
        match &self.shutdown {
            Some(shutdown) => tokio::select! {
                value = fut => Ok(value),
                _ = shutdown.wait_for_shutdown() => Err(EndpointError::Interrupted),
            },
            None => Ok(fut.await),
        }
    }

    fn count_json(&mut self, outcome: &WriteOutcome) {
        if outcome.path().is_some() {
            self.summary.json_files += 1;
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }
}

/// Positive integer `id` of an item
fn item_id(item: &Value) -> Option<u64> {
    item.get("id").and_then(Value::as_u64).filter(|id| *id != 0)
}

fn client_key(item: &Value) -> Option<&str> {
    item.get("client_key")
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
}

/// `https://<subdomain>.harvestapp.com/client/<resource>/<client_key>.pdf`
pub fn client_link_url(subdomain: &str, resource: &str, client_key: &str) -> String {
    format!("https://{subdomain}{HARVEST_DOMAIN_SUFFIX}/client/{resource}/{client_key}.pdf")
}
