//! Integration tests for the pagination reader against a mock collection API.

#[path = "support.rs"]
mod support;

use erpsync_infra::{PaginationReader, SendError};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reader(server: &MockServer) -> PaginationReader {
    PaginationReader::new(support::pipeline(&support::engine_config(server)))
}

#[tokio::test]
async fn aggregates_linked_pages_with_last_page_winning() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(support::page(
            json!([
                {"number": "A", "displayName": "Anchor"},
                {"number": "B", "displayName": "Bolt (page 1)"}
            ]),
            Some(format!("{}/items-p2", server.uri())),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items-p2"))
        .respond_with(support::page(
            json!([
                {"number": "b", "displayName": "Bolt (page 2)"},
                {"number": "C", "displayName": "Clamp"}
            ]),
            // Relative links resolve against the current page.
            Some("items-p3".to_string()),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items-p3"))
        .respond_with(support::page(json!([{"number": "D", "displayName": "Dowel"}]), None))
        .expect(1)
        .mount(&server)
        .await;

    let records = reader(&server)
        .fetch_all(&format!("{}/items", server.uri()), "number", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 4);
    assert_eq!(records.keys().collect::<Vec<_>>(), vec!["A", "b", "C", "D"]);
    assert_eq!(records.get("B").and_then(|r| r.text("displayName")).unwrap(), "Bolt (page 2)");
}

#[tokio::test]
async fn failed_page_returns_partial_results_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(support::page(
            json!([{"number": "A"}]),
            Some(format!("{}/items-p2", server.uri())),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items-p2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let records = reader(&server)
        .fetch_all(&format!("{}/items", server.uri()), "number", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(records.contains_key("a"));
}

#[tokio::test]
async fn malformed_page_stops_the_walk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(support::page(
            json!([{"number": "A"}, {"number": "B"}]),
            Some(format!("{}/items-p2", server.uri())),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items-p2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let records = reader(&server)
        .fetch_all(&format!("{}/items", server.uri()), "number", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn bare_array_body_is_a_single_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vendors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"number": "V1", "address": {"city": "Oslo"}},
            {"number": null},
            {"number": "V2", "tags": ["a", "b"]}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let records = reader(&server)
        .fetch_all(&format!("{}/vendors", server.uri()), "number", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    let v1 = records.get("v1").unwrap();
    assert_eq!(v1.text("address").unwrap(), r#"{"city":"Oslo"}"#);
}

#[tokio::test]
async fn next_link_to_the_same_page_does_not_loop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(support::page(
            json!([{"number": "A"}]),
            Some(format!("{}/items", server.uri())),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let records = reader(&server)
        .fetch_all(&format!("{}/items", server.uri()), "number", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn cancellation_is_reported_not_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(support::page(json!([{"number": "A"}]), None))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result =
        reader(&server).fetch_all(&format!("{}/items", server.uri()), "number", &cancel).await;

    assert_eq!(result.unwrap_err(), SendError::Cancelled);
}
