//! Scripted transport for driving the HTTP client without a network
//!
//! Routes are keyed by absolute URL. A key of the form `<url>?page=N` only
//! matches that page. Queued responses are consumed in order; once a route's
//! queue is empty the fixed response for the route (if any) is returned,
//! then the global fallback (404 unless overridden).

#![allow(dead_code)]

use async_trait::async_trait;
use harvest_backup::fetcher::{
    ApiRequest, ClientConfig, HarvestHttpClient, HttpTransport, RawResponse, TransportError,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCOUNTS_URL: &str = "https://id.test/api/v2/accounts";
pub const API_BASE: &str = "https://api.test";
pub const TOKEN: &str = "test-token";

type Scripted = Result<RawResponse, TransportError>;

#[derive(Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fixed: Mutex<HashMap<String, RawResponse>>,
    fallback: Mutex<Option<RawResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue one response for a route
    pub fn push(&self, route: &str, response: RawResponse) {
        self.push_result(route, Ok(response));
    }

    pub fn push_json(&self, route: &str, status: u16, body: Value) {
        self.push(route, RawResponse::json_body(status, &body));
    }

    pub fn push_error(&self, route: &str, error: TransportError) {
        self.push_result(route, Err(error));
    }

    fn push_result(&self, route: &str, result: Scripted) {
        self.queued
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(result);
    }

    /// Answer every (remaining) request to a route with the same response
    pub fn always(&self, route: &str, response: RawResponse) {
        self.fixed
            .lock()
            .unwrap()
            .insert(route.to_string(), response);
    }

    pub fn always_json(&self, route: &str, status: u16, body: Value) {
        self.always(route, RawResponse::json_body(status, &body));
    }

    /// Response for requests no route matches
    pub fn set_fallback(&self, response: RawResponse) {
        *self.fallback.lock().unwrap() = Some(response);
    }

    /// Every request seen, in order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests to one URL, any query
    pub fn requests_to(&self, url: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }

    pub fn attempts(&self, url: &str) -> usize {
        self.requests_to(url).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        let paged = request
            .query_value("page")
            .map(|page| format!("{}?page={}", request.url, page));
        let keys: Vec<&String> = paged.iter().chain(std::iter::once(&request.url)).collect();

        {
            let mut queued = self.queued.lock().unwrap();
            for key in &keys {
                if let Some(next) = queued.get_mut(*key).and_then(VecDeque::pop_front) {
                    return next;
                }
            }
        }

        {
            let fixed = self.fixed.lock().unwrap();
            for key in &keys {
                if let Some(response) = fixed.get(*key) {
                    return Ok(response.clone());
                }
            }
        }

        Ok(self
            .fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| RawResponse::json_body(404, &json!({"message": "Not Found"}))))
    }
}

/// Absolute API URL for a path
pub fn api(path: &str) -> String {
    format!("{API_BASE}{path}")
}

/// Client settings pointing at the mock hosts, with fast retries
pub fn test_config() -> ClientConfig {
    ClientConfig::new(TOKEN)
        .with_accounts_url(ACCOUNTS_URL)
        .with_api_base_url(API_BASE)
        .with_retry_delay(Duration::from_millis(10))
        .with_rate_limit(10_000, Duration::from_secs(15))
}

pub fn client(transport: &Arc<MockTransport>) -> HarvestHttpClient {
    client_with(transport, test_config())
}

pub fn client_with(transport: &Arc<MockTransport>, config: ClientConfig) -> HarvestHttpClient {
    HarvestHttpClient::with_transport(config, transport.clone())
}

/// Accounts-discovery body for `(id, name, product)` triples
pub fn accounts_body(accounts: &[(u64, &str, &str)]) -> Value {
    let accounts: Vec<Value> = accounts
        .iter()
        .map(|(id, name, product)| json!({"id": id, "name": name, "product": product}))
        .collect();
    json!({
        "user": {"id": 1, "first_name": "Test", "last_name": "User", "email": "[email protected]"},
        "accounts": accounts
    })
}

/// Minimal company profile for a subdomain
pub fn company_body(name: &str, subdomain: &str) -> Value {
    json!({
        "name": name,
        "full_domain": format!("{subdomain}.harvestapp.com"),
        "base_uri": format!("https://{subdomain}.harvestapp.com"),
        "is_active": true
    })
}

/// One account `12345` with subdomain `acme`
pub fn single_account(transport: &MockTransport) {
    transport.always_json(
        ACCOUNTS_URL,
        200,
        accounts_body(&[(12345, "Test Company", "harvest")]),
    );
    transport.always_json(&api("/v2/company"), 200, company_body("Test Company", "acme"));
}
