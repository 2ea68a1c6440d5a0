//! Public client-link downloads

use harvest_backup::fetcher::transport::RequestScope;
use harvest_backup::fetcher::RawResponse;
use serde_json::json;

use crate::support::mock_transport::{client, MockTransport};

const LINK: &str = "https://acme.harvestapp.com/client/invoices/abc123.pdf";

#[tokio::test]
async fn test_client_link_is_unauthenticated() {
    let transport = MockTransport::new();
    transport.always(LINK, RawResponse::new(200, "%PDF-1.4 test"));

    let client = client(&transport);
    let body = client.download_client_link(LINK).await.unwrap();

    assert_eq!(&body[..], b"%PDF-1.4 test");

    let request = &transport.requests()[0];
    assert_eq!(request.scope, RequestScope::Public);
    assert!(request.header_value("Authorization").is_none());
    assert!(request.header_value("Harvest-Account-Id").is_none());
    assert_eq!(
        request.header_value("User-Agent"),
        Some("HarvestBackupTool/0.1.0")
    );
}

#[tokio::test]
async fn test_client_link_failure_is_not_retried() {
    let transport = MockTransport::new();
    transport.always_json(LINK, 503, json!({"message": "unavailable"}));

    let client = client(&transport);
    let err = client.download_client_link(LINK).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(transport.attempts(LINK), 1);
}

#[tokio::test]
async fn test_client_link_bypasses_rate_limiter() {
    let transport = MockTransport::new();
    transport.always(LINK, RawResponse::new(200, "%PDF"));

    let client = client(&transport);
    client.download_client_link(LINK).await.unwrap();
    client.download_client_link(LINK).await.unwrap();

    assert_eq!(client.rate_limiter().in_window().await, 0);
}
