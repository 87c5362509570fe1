//! Retry behavior for rate-limited (HTTP 429) requests.
//!
//! The mocks send `Retry-After: 0` so the backoff path is exercised without
//! slowing the suite down.

mod common;

use common::*;
use kvbulk_client::ClientError;

#[tokio::test]
async fn test_429_then_success_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "0")
                .set_body_json(error_envelope(10000, "rate limited")),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(keys_page(serde_json::json!([{"name": "k1"}]), "")),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let page = client
        .list_keys_page(NAMESPACE, None, None, None)
        .await
        .unwrap();
    assert_eq!(page.keys.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_429_exhaustion_reports_max_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "0")
                .set_body_json(error_envelope(10000, "rate limited")),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .list_keys_page(NAMESPACE, None, None, None)
        .await
        .unwrap_err();
    match err {
        ClientError::MaxRetriesExceeded { attempts, source } => {
            // Default budget is 3 retries, so 4 attempts total.
            assert_eq!(attempts, 4);
            assert!(matches!(*source, ClientError::Api { status: 429, .. }));
        }
        other => panic!("expected MaxRetriesExceeded, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_5xx_is_not_retried_by_transport() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .list_keys_page(NAMESPACE, None, None, None)
        .await
        .unwrap_err();
    // 5xx surfaces immediately; the pager owns that retry budget.
    assert!(matches!(err, ClientError::Api { status: 503, .. }));
    assert!(err.is_transient());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
