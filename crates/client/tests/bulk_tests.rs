//! Bulk write and bulk delete endpoint tests.

mod common;

use common::*;
use kvbulk_client::{ClientError, WriteItem};

fn bulk_path() -> String {
    format!("/accounts/{ACCOUNT}/storage/kv/namespaces/{NAMESPACE}/bulk")
}

fn bulk_delete_path() -> String {
    format!("/accounts/{ACCOUNT}/storage/kv/namespaces/{NAMESPACE}/bulk/delete")
}

#[tokio::test]
async fn test_bulk_write_success() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(bulk_path()))
        .and(body_json(serde_json::json!([
            {"key": "k1", "value": "v1"},
            {"key": "k2", "value": "v2", "expiration_ttl": 60}
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_envelope(
            serde_json::json!({"successful_key_count": 2, "unsuccessful_keys": []}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut second = WriteItem::new("k2", "v2");
    second.expiration_ttl = Some(60);
    let result = client
        .bulk_write(NAMESPACE, &[WriteItem::new("k1", "v1"), second])
        .await
        .unwrap();
    assert_eq!(result.successful_key_count, Some(2));
}

#[tokio::test]
async fn test_bulk_write_oversized_batch_rejected_without_traffic() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    let items: Vec<WriteItem> = (0..10_001)
        .map(|i| WriteItem::new(format!("k{i}"), "v"))
        .collect();
    let err = client.bulk_write(NAMESPACE, &items).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_write_empty_batch_is_noop() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    let result = client.bulk_write(NAMESPACE, &[]).await.unwrap();
    assert!(result.successful_key_count.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_delete_uses_primary_verb() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .and(body_json(serde_json::json!(["k1", "k2"])))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!(null))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    client
        .bulk_delete(NAMESPACE, &["k1".to_string(), "k2".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_bulk_delete_falls_back_to_delete_verb_on_4xx() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(bulk_path()))
        .and(body_json(serde_json::json!([
            {"name": "k1"},
            {"name": "k2"}
        ])))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!(null))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    client
        .bulk_delete(NAMESPACE, &["k1".to_string(), "k2".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_bulk_delete_5xx_does_not_fall_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .bulk_delete(NAMESPACE, &["k1".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 500, .. }));
    // Only the primary verb was attempted.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bulk_delete_oversized_batch_rejected() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    let keys: Vec<String> = (0..1001).map(|i| format!("k{i}")).collect();
    let err = client.bulk_delete(NAMESPACE, &keys).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_delete_envelope_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(error_envelope(10033, "namespace is read-only")),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .bulk_delete(NAMESPACE, &["k1".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "failed to delete keys: namespace is read-only");
}
