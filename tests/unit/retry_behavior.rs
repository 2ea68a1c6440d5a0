//! Retry/backoff behavior of the API client against scripted responses

use harvest_backup::fetcher::{FetcherError, RawResponse, TransportError};
use reqwest::Method;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

use crate::support::mock_transport::{api, client, client_with, test_config, MockTransport};

fn ok_body() -> serde_json::Value {
    json!({"clients": [{"id": 1}], "next_page": null})
}

#[tokio::test(start_paused = true)]
async fn test_429_twice_then_success() {
    let transport = MockTransport::new();
    let url = api("/v2/clients");
    transport.push_json(&url, 429, json!({"message": "Too many requests"}));
    transport.push_json(&url, 429, json!({"message": "Too many requests"}));
    transport.push_json(&url, 200, ok_body());

    let client = client(&transport);
    let response = client.request(Method::GET, &url, Some(12345), &[]).await;

    assert!(response.is_ok());
    assert_eq!(transport.attempts(&url), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_header_sets_the_wait() {
    let transport = MockTransport::new();
    let url = api("/v2/clients");
    transport.push(
        &url,
        RawResponse::json_body(429, &json!({"message": "slow down"})).with_header("Retry-After", "2"),
    );
    transport.push_json(&url, 200, ok_body());

    let client = client(&transport);
    let start = Instant::now();
    client.get_json("/v2/clients", 12345, &[]).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(transport.attempts(&url), 2);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_retry_after_falls_back_to_backoff() {
    let transport = MockTransport::new();
    let url = api("/v2/clients");
    transport.push(
        &url,
        RawResponse::json_body(429, &json!({"message": "slow down"})).with_header("Retry-After", "1e20"),
    );
    transport.push_json(&url, 200, ok_body());

    let client = client(&transport);
    let start = Instant::now();
    client.get_json("/v2/clients", 12345, &[]).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(transport.attempts(&url), 2);
}

#[tokio::test(start_paused = true)]
async fn test_429_outlasting_budget_is_rate_limited_error() {
    let transport = MockTransport::new();
    let url = api("/v2/clients");
    transport.always_json(&url, 429, json!({"message": "Too many requests"}));

    let client = client_with(&transport, test_config().with_max_retries(2));
    let err = client.get_json("/v2/clients", 12345, &[]).await.unwrap_err();

    match err {
        FetcherError::RateLimited { attempts, url: failed } => {
            assert_eq!(attempts, 3);
            assert_eq!(failed, url);
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert_eq!(transport.attempts(&url), 3);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_exhausts_retries() {
    let transport = MockTransport::new();
    let url = api("/v2/projects");
    transport.always_json(&url, 500, json!({"message": "Internal error"}));

    let client = client(&transport);
    let max_retries = client.config().max_retries;
    let err = client.get_json("/v2/projects", 12345, &[]).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("Internal error"));
    assert_eq!(transport.attempts(&url), max_retries as usize + 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    let transport = MockTransport::new();
    let url = api("/v2/projects");
    transport.always_json(&url, 503, json!({}));

    let config = test_config()
        .with_max_retries(3)
        .with_retry_delay(Duration::from_secs(1));
    let client = client_with(&transport, config);

    let start = Instant::now();
    let _ = client.get_json("/v2/projects", 12345, &[]).await;

    // 1 + 2 + 4 seconds of backoff
    assert!(start.elapsed() >= Duration::from_secs(7));
    assert!(start.elapsed() < Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_means_single_attempt() {
    let transport = MockTransport::new();
    let url = api("/v2/projects");
    transport.always_json(&url, 502, json!({}));

    let client = client_with(&transport, test_config().with_max_retries(0));
    assert!(client.get_json("/v2/projects", 1, &[]).await.is_err());
    assert_eq!(transport.attempts(&url), 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_errors_are_retried() {
    let transport = MockTransport::new();
    let url = api("/v2/tasks");
    transport.push_error(&url, TransportError::Network("connection reset".to_string()));
    transport.push_error(&url, TransportError::Timeout("timed out".to_string()));
    transport.push_json(&url, 200, json!({"tasks": []}));

    let client = client(&transport);
    assert!(client.get_json("/v2/tasks", 1, &[]).await.is_ok());
    assert_eq!(transport.attempts(&url), 3);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_network_error_surfaces() {
    let transport = MockTransport::new();
    let url = api("/v2/tasks");
    for _ in 0..4 {
        transport.push_error(&url, TransportError::Network("unreachable".to_string()));
    }

    let client = client(&transport);
    let err = client.get_json("/v2/tasks", 1, &[]).await.unwrap_err();
    assert!(matches!(err, FetcherError::NetworkError(_)));
    assert_eq!(transport.attempts(&url), 4);
}

#[tokio::test(start_paused = true)]
async fn test_401_fails_immediately() {
    let transport = MockTransport::new();
    let url = api("/v2/clients");
    transport.always_json(&url, 401, json!({"message": "Invalid token"}));

    let client = client(&transport);
    let err = client.get_json("/v2/clients", 1, &[]).await.unwrap_err();

    assert!(err.is_authentication());
    assert_eq!(err.to_string(), "Unauthorized (401): Invalid token");
    assert_eq!(transport.attempts(&url), 1);
}

#[tokio::test(start_paused = true)]
async fn test_403_and_404_are_not_retried() {
    let transport = MockTransport::new();
    let forbidden = api("/v2/invoices");
    let missing = api("/v2/estimates");
    transport.always_json(&forbidden, 403, json!({"error": "forbidden"}));
    transport.always_json(&missing, 404, json!({"message": "Not Found"}));

    let client = client(&transport);

    let err = client.get_json("/v2/invoices", 1, &[]).await.unwrap_err();
    assert!(err.is_authentication());
    assert_eq!(err.status(), Some(403));

    let err = client.get_json("/v2/estimates", 1, &[]).await.unwrap_err();
    assert!(!err.is_authentication());
    assert_eq!(err.status(), Some(404));

    assert_eq!(transport.attempts(&forbidden), 1);
    assert_eq!(transport.attempts(&missing), 1);
}

#[tokio::test(start_paused = true)]
async fn test_every_attempt_counts_against_rate_limit() {
    let transport = MockTransport::new();
    let url = api("/v2/clients");
    transport.push_json(&url, 500, json!({}));
    transport.push_json(&url, 500, json!({}));
    transport.push_json(&url, 200, ok_body());

    let client = client(&transport);
    client.get_json("/v2/clients", 1, &[]).await.unwrap();

    assert_eq!(client.rate_limiter().in_window().await, 3);
}

#[tokio::test]
async fn test_request_headers() {
    let transport = MockTransport::new();
    transport.always_json(&api("/v2/users/me"), 200, json!({"id": 1}));

    let client = client(&transport);
    client.get_json("/v2/users/me", 12345, &[]).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.header_value("Authorization"), Some("Bearer test-token"));
    assert_eq!(
        request.header_value("User-Agent"),
        Some("HarvestBackupTool/0.1.0")
    );
    assert_eq!(request.header_value("Harvest-Account-Id"), Some("12345"));
}
