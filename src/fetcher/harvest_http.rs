//! Harvest HTTP client
//!
//! Every API call goes through [`HarvestHttpClient::request`], which applies
//! the shared rate limiter before each attempt and drives the retry loop with
//! [`decide_retry`]. Pagination is exposed as a lazy [`ItemStream`].

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::pagination::{extract_items, has_next_page, PageItems};
use super::retry::{decide_retry, parse_retry_after, AttemptFailure, RetryDecision};
use super::transport::{ApiRequest, HttpTransport, RawResponse, ReqwestTransport};
use super::{FetcherError, FetcherResult, ItemStream};
use crate::downloader::config::{
    DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW,
    DEFAULT_RETRY_DELAY_MS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, MAX_PER_PAGE,
};
use crate::downloader::rate_limit::RateLimiter;
use crate::metrics::{record_retry_backoff, HttpRequestMetrics};
use crate::AccountsResponse;

/// Accounts discovery endpoint (no account scope)
pub const DEFAULT_ACCOUNTS_URL: &str = "https://id.getharvest.com/api/v2/accounts";

/// Base URL for account-scoped API calls
pub const DEFAULT_API_BASE_URL: &str = "https://api.harvestapp.com";

/// Header selecting the account for API calls
pub const ACCOUNT_ID_HEADER: &str = "Harvest-Account-Id";

/// Upper bound on pages fetched for one listing
const MAX_PAGES: u32 = 10_000;

/// Client settings
#[derive(Clone)]
pub struct ClientConfig {
    /// Personal access token
    pub token: String,
    /// `User-Agent` header value
    pub user_agent: String,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff before the first retry
    pub retry_delay: Duration,
    /// Overall timeout per request
    pub timeout: Duration,
    /// Accounts discovery URL
    pub accounts_url: String,
    /// API base URL
    pub api_base_url: String,
    /// Requests allowed per rate-limit window
    pub rate_limit_requests: usize,
    /// Rate-limit window length
    pub rate_limit_window: Duration,
}

impl ClientConfig {
    /// Defaults for the given token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            rate_limit_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }

    /// Set the `User-Agent`
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base backoff delay
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point discovery at another URL
    pub fn with_accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = url.into();
        self
    }

    /// Point API calls at another base URL
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the rate-limit quota
    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.rate_limit_requests = max_requests;
        self.rate_limit_window = window;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

// The token must never end up in logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("timeout", &self.timeout)
            .field("accounts_url", &self.accounts_url)
            .field("api_base_url", &self.api_base_url)
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_window", &self.rate_limit_window)
            .finish()
    }
}

/// Client for the Harvest v2 API
///
/// Cheap to clone; clones share the transport and the rate limiter.
#[derive(Clone)]
pub struct HarvestHttpClient {
    transport: Arc<dyn HttpTransport>,
    rate_limiter: Arc<RateLimiter>,
    config: Arc<ClientConfig>,
}

impl fmt::Debug for HarvestHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestHttpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HarvestHttpClient {
    /// Build a client with the reqwest transport
    ///
    /// # Errors
    /// Returns `FetcherError::ConfigError` if the HTTP clients cannot be built
    pub fn from_config(config: ClientConfig) -> FetcherResult<Self> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client over any transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window,
        ));
        Self {
            transport,
            rate_limiter,
            config: Arc::new(config),
        }
    }

    /// Client settings
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The limiter applied to API calls
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Absolute URL for an API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    /// Issue one logical request with rate limiting and retries
    ///
    /// `Harvest-Account-Id` is sent only when `account_id` is given.
    ///
    /// # Errors
    /// `Authentication` for 401/403, `Status` for other non-2xx statuses once
    /// retries are exhausted or not applicable, `RateLimited` when 429s
    /// outlast the retry budget, `NetworkError`/`Timeout` for transport
    /// failures.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        account_id: Option<u64>,
        params: &[(String, String)],
    ) -> FetcherResult<RawResponse> {
        let mut request = ApiRequest::get(url)
            .with_query(params.to_vec())
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("User-Agent", self.config.user_agent.clone());
        request.method = method.clone();
        if let Some(id) = account_id {
            request = request.header(ACCOUNT_ID_HEADER, id.to_string());
        }

        let max_attempts = self.config.max_retries + 1;
        let mut attempt: u32 = 0;

        loop {
            self.rate_limiter.wait_if_needed().await;

            let metrics = HttpRequestMetrics::start(url, attempt);
            let failure = match self.transport.send(&request).await {
                Ok(response) => {
                    metrics.record_complete(response.status.as_u16());
                    if response.is_success() {
                        debug!("{} {}{} OK", method, url, page_info(params));
                        return Ok(response);
                    }
                    AttemptFailure::Status {
                        status: response.status,
                        url: url.to_string(),
                        retry_after: response.header("retry-after").and_then(parse_retry_after),
                        body: response.text(),
                    }
                }
                Err(err) => {
                    metrics.record_network_error();
                    AttemptFailure::Transport(err)
                }
            };

            match decide_retry(
                failure,
                attempt,
                self.config.max_retries,
                self.config.retry_delay,
            ) {
                RetryDecision::RetryAfter { wait, reason } => {
                    warn!(
                        "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... [{}]",
                        attempt + 2,
                        max_attempts,
                        reason.description(),
                        wait.as_secs_f64(),
                        url
                    );
                    record_retry_backoff(wait, attempt + 1);
                    sleep(wait).await;
                    attempt += 1;
                }
                RetryDecision::Fatal(err) => return Err(err),
                RetryDecision::Exhausted(err) => {
                    warn!(
                        "Giving up on {} after {} attempt(s): {}",
                        url,
                        attempt + 1,
                        err
                    );
                    return Err(err);
                }
            }
        }
    }

    /// GET an account-scoped API path and parse the body as JSON
    pub async fn get_json(
        &self,
        path: &str,
        account_id: u64,
        params: &[(String, String)],
    ) -> FetcherResult<Value> {
        self.request(Method::GET, &self.api_url(path), Some(account_id), params)
            .await?
            .json()
    }

    /// GET the accounts visible to the token
    ///
    /// Sent without `Harvest-Account-Id`.
    pub async fn get_accounts(&self) -> FetcherResult<AccountsResponse> {
        let payload = self
            .request(Method::GET, &self.config.accounts_url, None, &[])
            .await?
            .json()?;
        serde_json::from_value(payload)
            .map_err(|e| FetcherError::ParseError(format!("Invalid accounts response: {e}")))
    }

    /// GET `/v2/company` for an account
    pub async fn get_company(&self, account_id: u64) -> FetcherResult<Value> {
        self.get_json("/v2/company", account_id, &[]).await
    }

    /// Lazily walk every page of a listing
    ///
    /// Pages are requested with `page=N&per_page=2000` starting at 1, after
    /// any caller-supplied parameters (which may not override either). The
    /// stream ends after the first page that announces no successor, or after
    /// yielding an error.
    pub fn paginate(
        &self,
        path: &str,
        account_id: u64,
        params: &[(String, String)],
    ) -> ItemStream {
        let client = self.clone();
        let url = self.api_url(path);
        let base_params: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| k != "page" && k != "per_page")
            .cloned()
            .collect();

        let stream = stream::unfold(Some(1u32), move |next_page| {
            let client = client.clone();
            let url = url.clone();
            let mut query = base_params.clone();

            async move {
                let page = next_page?;

                if page > MAX_PAGES {
                    let err = FetcherError::InvalidResponse(format!(
                        "Max pages ({MAX_PAGES}) exceeded for {url} - possible infinite loop"
                    ));
                    return Some((stream::iter(vec![Err(err)]), None));
                }

                query.push(("page".to_string(), page.to_string()));
                query.push(("per_page".to_string(), MAX_PER_PAGE.to_string()));

                let payload = match client
                    .request(Method::GET, &url, Some(account_id), &query)
                    .await
                    .and_then(|response| response.json())
                {
                    Ok(payload) => payload,
                    Err(e) => return Some((stream::iter(vec![Err(e)]), None)),
                };

                let following = has_next_page(&payload).then_some(page + 1);
                match extract_items(payload) {
                    PageItems::List(items) => {
                        debug!("Received {} items in page {} of {}", items.len(), page, url);
                        let items: Vec<FetcherResult<Value>> = items.into_iter().map(Ok).collect();
                        Some((stream::iter(items), following))
                    }
                    PageItems::Single(item) => Some((stream::iter(vec![Ok(item)]), None)),
                }
            }
        })
        .flatten();

        Box::pin(stream)
    }

    /// GET binary content through the normal retry path
    ///
    /// Returns the body and the lower-cased `content-type` (empty if absent).
    pub async fn get_binary(
        &self,
        path: &str,
        account_id: u64,
        params: &[(String, String)],
    ) -> FetcherResult<(Bytes, String)> {
        let response = self
            .request(Method::GET, &self.api_url(path), Some(account_id), params)
            .await?;
        let content_type = response.content_type();
        Ok((response.body, content_type))
    }

    /// Download a public client link
    ///
    /// No token, no rate limiting and no retries; redirects are followed.
    ///
    /// # Errors
    /// `Status` for any non-2xx answer, `NetworkError`/`Timeout` otherwise.
    pub async fn download_client_link(&self, url: &str) -> FetcherResult<Bytes> {
        let request = ApiRequest::get(url)
            .public()
            .header("User-Agent", self.config.user_agent.clone());

        let metrics = HttpRequestMetrics::start(url, 0);
        let response = match self.transport.send(&request).await {
            Ok(response) => {
                metrics.record_complete(response.status.as_u16());
                response
            }
            Err(err) => {
                metrics.record_network_error();
                return Err(err.into());
            }
        };

        if !response.is_success() {
            let body = response.text();
            return Err(FetcherError::Status {
                status: response.status.as_u16(),
                url: url.to_string(),
                message: super::error_message::extract_error_message(&body, response.status),
            });
        }

        debug!("GET {} OK", url);
        Ok(response.body)
    }
}

/// ` page=N` (and ` per_page=M` when not the maximum) for request log lines
fn page_info(params: &[(String, String)]) -> String {
    let value = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let Some(page) = value("page") else {
        return String::new();
    };
    let mut info = format!(" page={page}");
    if let Some(per_page) = value("per_page") {
        if per_page != MAX_PER_PAGE.to_string() {
            info.push_str(&format!(" per_page={per_page}"));
        }
    }
    info
}
