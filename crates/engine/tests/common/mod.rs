//! Common test utilities for engine integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use secrecy::SecretString;

use kvbulk_client::{AuthStrategy, KvClient};

pub use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
pub use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ACCOUNT: &str = "acct-test";
pub const NAMESPACE: &str = "ns-test";

/// Build a client pointed at the mock server, with the rate limiter opened
/// wide so tests never sleep on the bucket.
pub fn test_client(server: &MockServer) -> KvClient {
    KvClient::builder()
        .base_url(server.uri())
        .account_id(ACCOUNT.to_string())
        .auth_strategy(AuthStrategy::ApiToken {
            token: SecretString::new("test-token".to_string().into()),
        })
        .rate_limit(1_000_000.0, 1_000_000.0)
        .build()
        .expect("test client should build")
}

pub fn success_envelope(result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result
    })
}

pub fn error_envelope(code: i64, message: &str) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "errors": [{"code": code, "message": message}],
        "messages": [],
        "result": null
    })
}

pub fn keys_page(keys: serde_json::Value, cursor: &str) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": keys,
        "result_info": {"cursor": cursor, "count": null}
    })
}

pub fn keys_path() -> String {
    format!("/accounts/{ACCOUNT}/storage/kv/namespaces/{NAMESPACE}/keys")
}

pub fn bulk_delete_path() -> String {
    format!("/accounts/{ACCOUNT}/storage/kv/namespaces/{NAMESPACE}/bulk/delete")
}

pub fn metadata_path(key: &str) -> String {
    format!("/accounts/{ACCOUNT}/storage/kv/namespaces/{NAMESPACE}/metadata/{key}")
}

pub fn value_path(key: &str) -> String {
    format!("/accounts/{ACCOUNT}/storage/kv/namespaces/{NAMESPACE}/values/{key}")
}

/// Count the requests that hit the bulk-delete endpoint.
pub async fn bulk_delete_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with("/bulk/delete"))
        .count()
}
