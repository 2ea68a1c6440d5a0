//! HTTP transport abstraction
//!
//! [`HarvestHttpClient`](super::HarvestHttpClient) owns the request policy
//! (headers, rate limiting, retries, pagination). The transport only moves one
//! request over the wire and hands back status, headers and body. Keeping the
//! seam here lets the retry and pagination state machines run against a
//! scripted transport in tests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::{FetcherError, FetcherResult};

/// HTTP connect timeout (seconds) - time to establish the TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Redirects followed for public client links
const MAX_PUBLIC_REDIRECTS: usize = 10;

/// Which HTTP client configuration a request goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScope {
    /// Authenticated API call, redirects not followed
    Api,
    /// Public client link, no credentials, redirects followed
    Public,
}

/// One outgoing request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Client configuration to use
    pub scope: RequestScope,
}

impl ApiRequest {
    /// Create a GET request for the API scope
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            scope: RequestScope::Api,
        }
    }

    /// Switch to the public (unauthenticated) scope
    pub fn public(mut self) -> Self {
        self.scope = RequestScope::Public;
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the query parameters
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Value of a header, matched case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a query parameter
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Response as received from the wire
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Bytes,
}

impl RawResponse {
    /// Build a response from a status code and body
    ///
    /// Unknown status codes become 500.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Build a JSON response
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string()).with_header("content-type", "application/json")
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Value of a header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Lower-cased `content-type`, empty when absent
    pub fn content_type(&self) -> String {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Body decoded as (lossy) UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    pub fn json(&self) -> FetcherResult<Value> {
        serde_json::from_slice(&self.body)
            .map_err(|e| FetcherError::ParseError(format!("Failed to parse JSON response: {e}")))
    }
}

/// Transport-level failures (no HTTP response was received)
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, reset, ...
    #[error("network error: {0}")]
    Network(String),
}

impl From<TransportError> for FetcherError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(msg) => FetcherError::Timeout(msg),
            TransportError::Network(msg) => FetcherError::NetworkError(msg),
        }
    }
}

/// Sends a single request
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and return whatever the server answered
    ///
    /// Non-2xx statuses are not errors at this level.
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by two reqwest clients
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    api: Client,
    public: Client,
}

impl ReqwestTransport {
    /// Build both clients with the given overall request timeout
    pub fn new(timeout: Duration) -> FetcherResult<Self> {
        let api = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| FetcherError::ConfigError(format!("Failed to build API client: {e}")))?;

        let public = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .redirect(Policy::limited(MAX_PUBLIC_REDIRECTS))
            .build()
            .map_err(|e| {
                FetcherError::ConfigError(format!("Failed to build client-link client: {e}"))
            })?;

        Ok(Self { api, public })
    }

    fn client(&self, scope: RequestScope) -> &Client {
        match scope {
            RequestScope::Api => &self.api,
            RequestScope::Public => &self.public,
        }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client(request.scope)
            .request(request.method.clone(), &request.url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
