//! Sliding-window rate limiting
//!
//! Keeps the timestamps of recent requests and suspends callers once the
//! quota for the trailing window is used up.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::downloader::config::{
    DEFAULT_RATE_LIMIT_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW, RATE_LIMIT_BUFFER,
};

/// Request-count rate limiter over a trailing time window
///
/// Safe to share between tasks: the prune, wait and append steps run under a
/// single async mutex, so racing callers queue up instead of overshooting the
/// quota.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    buffer: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window (at least 1)
    /// * `window` - Length of the trailing window
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            buffer: RATE_LIMIT_BUFFER,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Override the safety buffer added to computed waits
    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    /// Maximum requests per window
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Suspend until one more request fits into the window, then record it
    ///
    /// Returns how long the caller was suspended (zero when under quota).
    pub async fn wait_if_needed(&self) -> Duration {
        let mut timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        prune(&mut timestamps, now, self.window);

        let mut waited = Duration::ZERO;
        if timestamps.len() >= self.max_requests {
            if let Some(&oldest) = timestamps.front() {
                let wait = self
                    .window
                    .saturating_sub(now.duration_since(oldest))
                    + self.buffer;
                debug!(
                    wait_ms = wait.as_millis() as u64,
                    in_window = timestamps.len(),
                    "Rate limit reached, waiting"
                );
                sleep(wait).await;
                waited = wait;
                prune(&mut timestamps, Instant::now(), self.window);
            }
        }

        timestamps.push_back(Instant::now());
        if !waited.is_zero() {
            crate::metrics::record_rate_limit_wait(waited);
        }
        waited
    }

    /// Number of requests currently counted inside the window
    pub async fn in_window(&self) -> usize {
        let mut timestamps = self.timestamps.lock().await;
        prune(&mut timestamps, Instant::now(), self.window);
        timestamps.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW)
    }
}

/// Drop timestamps that are `window` or more in the past. Timestamps are
/// appended in order, so only the front needs checking.
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = timestamps.front() {
        if now.duration_since(front) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
