//! Harvest API access layer

use futures_util::Stream;
use serde_json::Value;
use std::pin::Pin;

pub mod accounts;
pub mod error_message;
pub mod harvest_http;
pub mod pagination;
pub mod retry;
pub mod transport;

pub use harvest_http::{ClientConfig, HarvestHttpClient};
pub use transport::{ApiRequest, HttpTransport, RawResponse, ReqwestTransport, TransportError};

/// HTTP status for "Unprocessable Entity", returned for permission-scoped sub-resources
pub const HTTP_STATUS_UNPROCESSABLE_ENTITY: u16 = 422;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// 401/403: the token is rejected. Never retried.
    #[error("{} ({status}): {message}", auth_label(.status))]
    Authentication {
        /// HTTP status code (401 or 403)
        status: u16,
        /// Message extracted from the response body
        message: String,
        /// Raw response body
        body: String,
    },

    /// Any other non-success HTTP status
    #[error("HTTP {status} for {url}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
        /// Message extracted from the response body
        message: String,
    },

    /// 429 responses kept coming until the retry budget ran out
    #[error("rate limit exceeded for {url} after {attempts} attempts")]
    RateLimited {
        /// Request URL
        url: String,
        /// Attempts made
        attempts: u32,
    },

    /// Connection-level failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Request timed out
    #[error("timeout: {0}")]
    Timeout(String),

    /// Response body could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Response parsed but did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP client could not be built
    #[error("client configuration error: {0}")]
    ConfigError(String),
}

fn auth_label(status: &u16) -> &'static str {
    if *status == 401 {
        "Unauthorized"
    } else {
        "Forbidden"
    }
}

impl FetcherError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetcherError::Authentication { status, .. } | FetcherError::Status { status, .. } => {
                Some(*status)
            }
            FetcherError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether this is an authentication failure (fatal for the whole run)
    pub fn is_authentication(&self) -> bool {
        matches!(self, FetcherError::Authentication { .. })
    }

    /// Whether the server answered 422 Unprocessable Entity
    pub fn is_unprocessable(&self) -> bool {
        self.status() == Some(HTTP_STATUS_UNPROCESSABLE_ENTITY)
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Lazy stream of items produced by pagination
pub type ItemStream = Pin<Box<dyn Stream<Item = FetcherResult<Value>> + Send>>;
