//! Main entry point for the harvest-backup CLI

use clap::Parser;
use harvest_backup::cli::{Cli, CliError, EXIT_FAILURE};
use harvest_backup::metrics::init_metrics;
use harvest_backup::shutdown::{ShutdownCoordinator, SharedShutdown};
use harvest_backup::BackupSummary;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing(default_filter: &str) {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: &Cli, shutdown: SharedShutdown) -> anyhow::Result<BackupSummary> {
    if let Some(addr) = cli.metrics_addr {
        init_metrics(addr).await.map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(cli.execute(shutdown).await?)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_filter());

    // Ctrl+C stops the run between endpoints
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping after the current request...");
                shutdown.request_shutdown();
            }
        }
    });

    match run(&cli, shutdown).await {
        Ok(summary) => {
            info!("Backup completed successfully");
            println!("✓ Backup completed successfully");
            println!("{summary}");
        }
        Err(e) => {
            let cli_error = e.downcast_ref::<CliError>();
            error!("Backup failed: {}", e);
            eprintln!("✗ Backup failed: {e}");
            if let Some(hint) = cli_error.and_then(CliError::remediation) {
                eprintln!("{hint}");
            }
            std::process::exit(cli_error.map_or(EXIT_FAILURE, CliError::exit_code));
        }
    }
}
