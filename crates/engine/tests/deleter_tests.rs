//! Bulk deleter integration tests: batching, bisection isolation, fallback.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;
use tokio_util::sync::CancellationToken;

use kvbulk_engine::BulkDeleter;

fn deleter(server: &MockServer) -> BulkDeleter {
    BulkDeleter::new(test_client(server), NAMESPACE, CancellationToken::new())
}

fn keys(range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|i| format!("k{i}")).collect()
}

/// Every bulk succeeds.
async fn mount_bulk_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!(null))),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_delete_batch_counts_keys() {
    let server = MockServer::start().await;
    mount_bulk_success(&server).await;

    let deleted = deleter(&server).delete_batch(&keys(1..=50)).await.unwrap();
    assert_eq!(deleted, 50);
    assert_eq!(bulk_delete_calls(&server).await, 1);
}

#[tokio::test]
async fn test_sequential_batches_chunk_and_report() {
    let server = MockServer::start().await;
    mount_bulk_success(&server).await;

    let reported = Arc::new(AtomicUsize::new(0));
    let sink = reported.clone();
    let outcome = deleter(&server)
        .delete_sequential_batches(
            &keys(1..=25),
            10,
            Some(Arc::new(move |n| {
                sink.fetch_add(n, Ordering::SeqCst);
            })),
        )
        .await;

    assert_eq!(outcome.deleted, 25);
    assert!(outcome.failures.is_empty());
    assert_eq!(reported.load(Ordering::SeqCst), 25);
    // 25 keys at batch size 10 is three bulk calls.
    assert_eq!(bulk_delete_calls(&server).await, 3);
}

#[tokio::test]
async fn test_sequential_batches_continue_past_failed_batch() {
    let server = MockServer::start().await;

    // The batch containing k5 is rejected; the others succeed.
    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .and(body_string_contains("\"k5\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope(10001, "rejected batch")),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!(null))),
        )
        .with_priority(5)
        .mount(&server)
        .await;

    // Batches: [k1..k4] ok, [k5..k8] rejected, [k9] ok.
    let outcome = deleter(&server)
        .delete_sequential_batches(&keys(1..=9), 4, None)
        .await;

    assert_eq!(outcome.deleted, 5);
    assert_eq!(outcome.failures.len(), 4);
    assert!(outcome.first_error.is_some());
}

#[tokio::test]
async fn test_concurrent_batches_delete_everything() {
    let server = MockServer::start().await;
    mount_bulk_success(&server).await;

    let outcome = deleter(&server)
        .delete_concurrent_batches(&keys(1..=100), 10, Some(4), None)
        .await;

    assert_eq!(outcome.deleted, 100);
    assert!(!outcome.cancelled);
    assert_eq!(bulk_delete_calls(&server).await, 10);
}

#[tokio::test]
async fn test_isolation_singles_out_rejecting_key() {
    let server = MockServer::start().await;

    // Any bulk containing k37 is rejected with an envelope failure (not a
    // 4xx, which would trigger the client's verb fallback instead).
    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .and(body_string_contains("\"k37\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope(10001, "k37 is protected")),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!(null))),
        )
        .with_priority(5)
        .mount(&server)
        .await;
    // The isolated singleton falls back to a single-key DELETE, which the
    // remote also rejects.
    Mock::given(method("DELETE"))
        .and(path(value_path("k37")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope(10001, "k37 is protected")),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    // Bisection also isolates healthy neighbours down to singletons; their
    // single-key DELETEs succeed.
    Mock::given(method("DELETE"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!(null))),
        )
        .with_priority(5)
        .mount(&server)
        .await;

    let input = keys(1..=100);
    let outcome = deleter(&server)
        .delete_with_isolation(input.clone())
        .await
        .unwrap();

    // S ∪ F covers the input, S ∩ F = ∅.
    assert_eq!(outcome.deleted.len(), 99);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].key, "k37");
    let deleted: HashSet<&String> = outcome.deleted.iter().collect();
    assert!(!deleted.contains(&"k37".to_string()));
    for key in &input {
        let in_deleted = deleted.contains(key);
        let in_failed = outcome.failures.iter().any(|f| &f.key == key);
        assert!(in_deleted ^ in_failed, "{key} must land in exactly one list");
    }

    // Binary search keeps the bulk call count logarithmic: one failing key
    // in 100 costs at most 2·⌈log2(100)⌉ + 1 bulk calls.
    let bulk_calls = bulk_delete_calls(&server).await;
    assert!(bulk_calls <= 15, "expected O(log n) bulk calls, got {bulk_calls}");
}

#[tokio::test]
async fn test_isolation_all_keys_healthy_is_single_call() {
    let server = MockServer::start().await;
    mount_bulk_success(&server).await;

    let outcome = deleter(&server)
        .delete_with_isolation(keys(1..=64))
        .await
        .unwrap();
    assert_eq!(outcome.deleted.len(), 64);
    assert!(outcome.failures.is_empty());
    assert_eq!(bulk_delete_calls(&server).await, 1);
}

#[tokio::test]
async fn test_fallback_counts_partial_successes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bulk_delete_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope(10001, "bulk unavailable")),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(value_path("k2")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope(10009, "key not found")),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    // Remaining single deletes succeed. Match any other values path.
    Mock::given(method("DELETE"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!(null))),
        )
        .with_priority(5)
        .mount(&server)
        .await;

    let outcome = deleter(&server)
        .delete_batch_with_fallback(&keys(1..=3))
        .await
        .unwrap();
    assert_eq!(outcome.deleted, 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].key, "k2");
}

#[tokio::test]
async fn test_repeated_bulk_delete_is_idempotent() {
    let server = MockServer::start().await;
    mount_bulk_success(&server).await;

    let deleter = deleter(&server);
    let first = deleter.delete_batch(&keys(1..=10)).await.unwrap();
    let second = deleter.delete_batch(&keys(1..=10)).await.unwrap();
    // The remote treats deletes of absent keys as success; re-running the
    // same batch reports the same count and changes nothing.
    assert_eq!(first, second);
}
