//! Per-key metadata endpoint tests.

mod common;

use common::*;

fn metadata_path(key: &str) -> String {
    format!("/accounts/{ACCOUNT}/storage/kv/namespaces/{NAMESPACE}/metadata/{key}")
}

#[tokio::test]
async fn test_get_metadata_present() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(metadata_path("k1")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(success_envelope(serde_json::json!({"tag": "old", "n": 3}))),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let metadata = client.get_metadata(NAMESPACE, "k1").await.unwrap().unwrap();
    assert_eq!(metadata["tag"], "old");
    assert_eq!(metadata["n"], 3);
}

#[tokio::test]
async fn test_get_metadata_envelope_failure_is_absent_not_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(metadata_path("k1")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope(10017, "no metadata")),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client.get_metadata(NAMESPACE, "k1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_metadata_null_result_is_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(metadata_path("k1")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!(null))),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client.get_metadata(NAMESPACE, "k1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_metadata_missing_key_is_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(metadata_path("gone")))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(error_envelope(10009, "key not found")),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client.get_metadata(NAMESPACE, "gone").await.unwrap().is_none());
}
