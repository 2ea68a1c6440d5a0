//! The `harvest-backup` command

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::CliError;
use crate::downloader::config::{DEFAULT_MAX_RETRIES, DEFAULT_USER_AGENT};
use crate::downloader::{BackupExecutor, BackupSummary};
use crate::fetcher::{ClientConfig, HarvestHttpClient};
use crate::output::BackupWriter;
use crate::shutdown::SharedShutdown;

/// Upper bound accepted for `--max-retries`
const MAX_RETRIES_LIMIT: u32 = 20;

/// Parse and validate `--retry-delay` (seconds)
fn parse_retry_delay(s: &str) -> Result<Duration, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number of seconds"))?;
    Duration::try_from_secs_f64(value)
        .map_err(|_| format!("retry delay must be a non-negative, finite number of seconds, got '{s}'"))
}

/// Harvest backup CLI
#[derive(Parser, Debug)]
#[command(name = "harvest-backup")]
#[command(
    about = "Back up all data from all Harvest accounts using the Harvest API v2",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Personal Access Token (or set HARVEST_PAT environment variable)
    #[arg(long, env = "HARVEST_PAT", hide_env_values = true)]
    pub pat: String,

    /// Output directory for backups
    #[arg(short, long, default_value = "./backup")]
    pub output: PathBuf,

    /// User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Retries after the first attempt for transient failures (0-20)
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_RETRIES,
        value_parser = clap::value_parser!(u32).range(0..=MAX_RETRIES_LIMIT as i64)
    )]
    pub max_retries: u32,

    /// Initial retry delay in seconds; doubles after every retry
    #[arg(long, default_value = "1.0", value_parser = parse_retry_delay)]
    pub retry_delay: Duration,

    /// Don't actually write files, just show what would be done
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Default tracing filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "harvest_backup=debug"
        } else {
            "harvest_backup=info"
        }
    }

    /// HTTP client settings from the arguments
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.pat.clone())
            .with_user_agent(self.user_agent.clone())
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }

    /// Run the backup
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<BackupSummary, CliError> {
        if self.dry_run {
            warn!("DRY RUN MODE - No files will be written");
        }
        info!("Backing up to {}", self.output.display());

        let client = HarvestHttpClient::from_config(self.client_config())?;
        let writer = BackupWriter::open(&self.output, self.dry_run)?;
        let mut executor = BackupExecutor::new(client, writer).with_shutdown(shutdown);

        let spinner = create_spinner();
        let result = executor.backup_all().await;
        spinner.finish_and_clear();

        Ok(result?)
    }
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Backing up Harvest accounts...");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
