//! Retry classification and decisions
//!
//! [`decide_retry`] is the whole retry state machine: given what went wrong on
//! one attempt, how many attempts were made and the base delay, it says
//! whether to wait and try again, give up immediately, or give up because the
//! budget is spent. The request loop in
//! [`HarvestHttpClient`](super::HarvestHttpClient) only sleeps and counts.

use reqwest::StatusCode;
use std::time::Duration;

use super::error_message::extract_error_message;
use super::transport::TransportError;
use super::FetcherError;
use crate::downloader::config::calculate_backoff;

/// Classification of a failed attempt, used in log lines and hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or reset
    NetworkOffline,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 401/403
    AuthFailed(u16),
    /// Other HTTP 4xx
    ClientError(u16),
}

impl RetryErrorType {
    /// Short description used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::AuthFailed(401) => "unauthorized (401)",
            Self::AuthFailed(403) => "forbidden (403)",
            Self::AuthFailed(_) => "authentication failed",
            Self::ClientError(code) => match code {
                404 => "resource not found",
                422 => "unprocessable entity",
                _ => "client error",
            },
        }
    }

    /// Remediation hint shown after a final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection and firewall settings",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Wait a few minutes before running the backup again",
            Self::ServerError(_) => "Harvest may be experiencing issues, try again later",
            Self::AuthFailed(_) => {
                "Check that your personal access token is valid and has not been revoked. \
                 Create a new one at https://id.getharvest.com/developers"
            }
            Self::ClientError(_) => "The token may lack permission for this resource",
        }
    }

    /// Whether failures of this kind are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::AuthFailed(_) | Self::ClientError(_))
    }
}

/// What went wrong on one attempt
#[derive(Debug, Clone)]
pub enum AttemptFailure {
    /// The server answered with a non-2xx status
    Status {
        /// HTTP status
        status: StatusCode,
        /// Request URL
        url: String,
        /// Raw response body (lossy UTF-8)
        body: String,
        /// Parsed `Retry-After` header
        retry_after: Option<Duration>,
    },
    /// No response was received
    Transport(TransportError),
}

impl AttemptFailure {
    /// Classify the failure
    pub fn error_type(&self) -> RetryErrorType {
        match self {
            Self::Status { status, .. } => {
                let code = status.as_u16();
                match code {
                    429 => RetryErrorType::RateLimit,
                    401 | 403 => RetryErrorType::AuthFailed(code),
                    c if c >= 500 => RetryErrorType::ServerError(c),
                    c => RetryErrorType::ClientError(c),
                }
            }
            Self::Transport(TransportError::Timeout(_)) => RetryErrorType::NetworkTimeout,
            Self::Transport(TransportError::Network(_)) => RetryErrorType::NetworkOffline,
        }
    }

    /// Convert into the error surfaced to callers
    pub fn into_error(self) -> FetcherError {
        match self {
            Self::Status {
                status, url, body, ..
            } => {
                let message = extract_error_message(&body, status);
                let code = status.as_u16();
                if code == 401 || code == 403 {
                    FetcherError::Authentication {
                        status: code,
                        message,
                        body,
                    }
                } else {
                    FetcherError::Status {
                        status: code,
                        url,
                        message,
                    }
                }
            }
            Self::Transport(err) => err.into(),
        }
    }
}

/// Outcome of [`decide_retry`]
#[derive(Debug)]
pub enum RetryDecision {
    /// Sleep for the given duration, then try again
    RetryAfter {
        /// How long to wait
        wait: Duration,
        /// Why the attempt failed
        reason: RetryErrorType,
    },
    /// Give up now; retrying cannot help
    Fatal(FetcherError),
    /// Give up; the failure was transient but the budget is spent
    Exhausted(FetcherError),
}

/// Decide what to do after a failed attempt
///
/// # Arguments
/// * `failure` - What went wrong
/// * `attempt` - 0-based index of the attempt that failed
/// * `max_retries` - Retries allowed after the first attempt
/// * `base_delay` - Backoff for the first retry; doubles for every retry after
pub fn decide_retry(
    failure: AttemptFailure,
    attempt: u32,
    max_retries: u32,
    base_delay: Duration,
) -> RetryDecision {
    let reason = failure.error_type();
    if !reason.is_retryable() {
        return RetryDecision::Fatal(failure.into_error());
    }

    if attempt >= max_retries {
        return RetryDecision::Exhausted(match failure {
            AttemptFailure::Status { url, .. } if reason == RetryErrorType::RateLimit => {
                FetcherError::RateLimited {
                    url,
                    attempts: attempt + 1,
                }
            }
            other => other.into_error(),
        });
    }

    let wait = match &failure {
        AttemptFailure::Status {
            retry_after: Some(wait),
            ..
        } if reason == RetryErrorType::RateLimit => *wait,
        _ => calculate_backoff(base_delay, attempt),
    };
    RetryDecision::RetryAfter { wait, reason }
}

/// Parse a `Retry-After` header given in (possibly fractional) seconds
///
/// HTTP-date values, negative numbers and values too large for a
/// [`Duration`] yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}
