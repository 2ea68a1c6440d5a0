//! Backup configuration constants

use std::time::Duration;

/// Requests allowed per rate-limit window.
/// Harvest allows 100 requests per 15 seconds per access token.
pub const DEFAULT_RATE_LIMIT_REQUESTS: usize = 100;

/// Length of the rate-limit window.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15);

/// Extra wait added when the limiter has to sleep, so the oldest request has
/// definitely left the window when we wake up.
pub const RATE_LIMIT_BUFFER: Duration = Duration::from_millis(100);

/// Maximum number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds. Doubles after every retryable failure.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Overall timeout for a single HTTP request (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Largest page size the API accepts.
pub const MAX_PER_PAGE: u32 = 2000;

/// Raw response bodies longer than this are truncated in error messages.
pub const ERROR_MESSAGE_MAX_LENGTH: usize = 200;

/// Number of hex characters of a fingerprint shown in log lines.
pub const HASH_DISPLAY_LENGTH: usize = 16;

/// Default User-Agent header value.
pub const DEFAULT_USER_AGENT: &str = "HarvestBackupTool/0.1.0";

/// Calculate the backoff delay before retry number `retry_count` (0-based)
///
/// Pure doubling from `base`, no cap and no jitter.
pub fn calculate_backoff(base: Duration, retry_count: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry_count))
}
