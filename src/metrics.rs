//! Backup observability metrics
//!
//! Counters and histograms for HTTP traffic, retries, rate-limit waits and
//! artifact downloads. Emission goes through the `metrics` facade and costs
//! nothing unless a recorder is installed; [`init_metrics`] installs a
//! Prometheus exporter with a scrape endpoint.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize the Prometheus exporter
///
/// Idempotent: later calls are no-ops.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g., "127.0.0.1:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to Harvest"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );
    describe_counter!(
        "rate_limit_waits_total",
        Unit::Count,
        "Times the client-side rate limiter suspended a request"
    );
    describe_histogram!(
        "rate_limit_wait_seconds",
        Unit::Seconds,
        "Time spent suspended by the client-side rate limiter"
    );
    describe_counter!(
        "artifacts_total",
        Unit::Count,
        "Binary artifacts by outcome (downloaded, unchanged, failed)"
    );
    describe_counter!(
        "endpoints_total",
        Unit::Count,
        "Endpoints processed by outcome (completed, failed)"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Low-cardinality label for a request URL
///
/// Drops scheme, host and query, and replaces numeric path segments with
/// `{id}`: `https://api.harvestapp.com/v2/users/42/teammates?page=1` becomes
/// `/v2/users/{id}/teammates`.
pub fn endpoint_label(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = match without_query.find("://") {
        Some(idx) => {
            let rest = &without_query[idx + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => without_query,
    };

    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Timing and outcome of one HTTP attempt
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start recording an attempt against `url`
    pub fn start(url: &str, attempt: u32) -> Self {
        let endpoint = endpoint_label(url);
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            attempt = attempt,
            "Starting HTTP request"
        );

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
            attempt,
        }
    }

    /// Record a received response
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        if status_code == 429 {
            counter!(
                "http_429_errors_total",
                "endpoint" => self.endpoint.clone(),
            )
            .increment(1);

            warn!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                attempt = self.attempt,
                "Rate limit response (429) received"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis() as u64,
            "HTTP request completed"
        );
    }

    /// Record a transport failure (no status code)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());
    }

    /// Correlation ID of this attempt
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a retry backoff
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!(
        "http_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!(
        "retry_backoff_duration_seconds",
        "attempt" => attempt.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record time spent suspended by the rate limiter
pub fn record_rate_limit_wait(duration: Duration) {
    counter!("rate_limit_waits_total").increment(1);
    histogram!("rate_limit_wait_seconds").record(duration.as_secs_f64());
}

/// Artifact outcome label values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Fetched and written
    Downloaded,
    /// Fingerprint matched, nothing fetched
    Unchanged,
    /// Fetch or write failed
    Failed,
}

impl ArtifactOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
        }
    }
}

/// Record the outcome for one binary artifact
pub fn record_artifact(resource: &str, outcome: ArtifactOutcome) {
    counter!(
        "artifacts_total",
        "resource" => resource.to_string(),
        "outcome" => outcome.as_str(),
    )
    .increment(1);
}

/// Record that an endpoint finished, successfully or not
pub fn record_endpoint(endpoint: &str, success: bool) {
    counter!(
        "endpoints_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => if success { "completed" } else { "failed" },
    )
    .increment(1);
}
