//! Common test utilities for client integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use secrecy::SecretString;

use kvbulk_client::{AuthStrategy, KvClient};

pub use wiremock::matchers::{body_json, method, path, query_param};
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

/// A successful envelope wrapping `result`.
pub fn success_envelope(result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result
    })
}

/// A failed envelope carrying one error message.
pub fn error_envelope(code: i64, message: &str) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "errors": [{"code": code, "message": message}],
        "messages": [],
        "result": null
    })
}

/// A key-listing page envelope.
pub fn keys_page(keys: serde_json::Value, cursor: &str) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": keys,
        "result_info": {"cursor": cursor, "count": null}
    })
}

/// Path of the key-listing endpoint under the test account.
pub fn keys_path() -> String {
    format!("/accounts/{ACCOUNT}/storage/kv/namespaces/{NAMESPACE}/keys")
}
