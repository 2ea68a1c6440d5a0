//! Pagination over the different Harvest response envelopes

use futures_util::StreamExt;
use harvest_backup::fetcher::{FetcherResult, HarvestHttpClient};
use serde_json::{json, Value};

use crate::support::mock_transport::{api, client, MockTransport};

async fn collect(client: &HarvestHttpClient, path: &str, params: &[(String, String)]) -> Vec<FetcherResult<Value>> {
    client.paginate(path, 12345, params).collect().await
}

fn ids(results: &[FetcherResult<Value>]) -> Vec<u64> {
    results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter_map(|item| item["id"].as_u64())
        .collect()
}

#[tokio::test]
async fn test_links_next_pagination() {
    let transport = MockTransport::new();
    let url = api("/v2/clients");
    transport.always_json(
        &format!("{url}?page=1"),
        200,
        json!({
            "clients": [{"id": 1}, {"id": 2}],
            "per_page": 2000,
            "links": {"next": "https://api.test/v2/clients?page=2"}
        }),
    );
    transport.always_json(
        &format!("{url}?page=2"),
        200,
        json!({"clients": [{"id": 3}], "links": {"next": null}}),
    );

    let client = client(&transport);
    let results = collect(&client, "/v2/clients", &[]).await;

    assert_eq!(ids(&results), vec![1, 2, 3]);
    let requests = transport.requests_to(&url);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].query_value("page"), Some("1"));
    assert_eq!(requests[1].query_value("page"), Some("2"));
    assert!(requests.iter().all(|r| r.query_value("per_page") == Some("2000")));
}

#[tokio::test]
async fn test_next_page_pagination() {
    let transport = MockTransport::new();
    let url = api("/v2/time_entries");
    transport.always_json(
        &format!("{url}?page=1"),
        200,
        json!({"time_entries": [{"id": 10}], "total_pages": 2, "next_page": 2, "page": 1}),
    );
    transport.always_json(
        &format!("{url}?page=2"),
        200,
        json!({"time_entries": [{"id": 11}], "total_pages": 2, "next_page": null, "page": 2}),
    );

    let client = client(&transport);
    let results = collect(&client, "/v2/time_entries", &[]).await;

    assert_eq!(ids(&results), vec![10, 11]);
    assert_eq!(transport.attempts(&url), 2);
}

#[tokio::test]
async fn test_bare_list_is_one_page() {
    let transport = MockTransport::new();
    let url = api("/v2/users/7/teammates");
    transport.always_json(&url, 200, json!([{"id": 1}, {"id": 2}]));

    let client = client(&transport);
    let results = collect(&client, "/v2/users/7/teammates", &[]).await;

    assert_eq!(ids(&results), vec![1, 2]);
    assert_eq!(transport.attempts(&url), 1);
}

#[tokio::test]
async fn test_single_object_yields_itself() {
    let transport = MockTransport::new();
    let url = api("/v2/users/me");
    transport.always_json(&url, 200, json!({"id": 42, "first_name": "Ada", "next_page": 2}));

    let client = client(&transport);
    let results = collect(&client, "/v2/users/me", &[]).await;

    assert_eq!(ids(&results), vec![42]);
    assert_eq!(transport.attempts(&url), 1);
}

#[tokio::test]
async fn test_empty_page_ends_stream() {
    let transport = MockTransport::new();
    let url = api("/v2/roles");
    transport.always_json(&url, 200, json!({"roles": [], "next_page": null}));

    let client = client(&transport);
    assert!(collect(&client, "/v2/roles", &[]).await.is_empty());
}

#[tokio::test]
async fn test_error_ends_stream_after_partial_results() {
    let transport = MockTransport::new();
    let url = api("/v2/expenses");
    transport.always_json(
        &format!("{url}?page=1"),
        200,
        json!({"expenses": [{"id": 1}, {"id": 2}], "next_page": 2}),
    );
    transport.always_json(&format!("{url}?page=2"), 404, json!({"message": "gone"}));

    let client = client(&transport);
    let results = collect(&client, "/v2/expenses", &[]).await;

    assert_eq!(results.len(), 3);
    assert_eq!(ids(&results), vec![1, 2]);
    assert_eq!(results[2].as_ref().unwrap_err().status(), Some(404));
}

#[tokio::test]
async fn test_caller_cannot_override_paging_params() {
    let transport = MockTransport::new();
    let url = api("/v2/projects");
    transport.always_json(&url, 200, json!({"projects": [{"id": 1}], "next_page": null}));

    let params = vec![
        ("page".to_string(), "5".to_string()),
        ("per_page".to_string(), "10".to_string()),
        ("is_active".to_string(), "true".to_string()),
    ];
    let client = client(&transport);
    collect(&client, "/v2/projects", &params).await;

    let request = &transport.requests_to(&url)[0];
    assert_eq!(request.query_value("page"), Some("1"));
    assert_eq!(request.query_value("per_page"), Some("2000"));
    assert_eq!(request.query_value("is_active"), Some("true"));
    assert_eq!(request.query.len(), 3);
}

#[tokio::test]
async fn test_pages_are_fetched_lazily() {
    let transport = MockTransport::new();
    let url = api("/v2/contacts");
    transport.always_json(
        &format!("{url}?page=1"),
        200,
        json!({"contacts": [{"id": 1}], "next_page": 2}),
    );
    transport.always_json(
        &format!("{url}?page=2"),
        200,
        json!({"contacts": [{"id": 2}], "next_page": null}),
    );

    let client = client(&transport);
    let mut stream = client.paginate("/v2/contacts", 12345, &[]);
    let first = stream.next().await.unwrap().unwrap();

    assert_eq!(first["id"], 1);
    assert_eq!(transport.attempts(&url), 1);
}
