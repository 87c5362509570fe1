//! Exporter integration tests: enumeration and ordered hydration.

mod common;

use common::*;
use tokio_util::sync::CancellationToken;

use kvbulk_engine::{Exporter, ListOptions};

fn exporter(server: &MockServer) -> Exporter {
    Exporter::new(test_client(server), NAMESPACE, CancellationToken::new())
}

#[tokio::test]
async fn test_list_all_keys_walks_every_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "k3"}, {"name": "k4"}]),
            "",
        )))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "k1"}, {"name": "k2"}]),
            "c1",
        )))
        .with_priority(5)
        .mount(&server)
        .await;

    let outcome = exporter(&server)
        .list_all_keys(&ListOptions::default())
        .await
        .unwrap();

    // Pages arrive in cursor order.
    let names: Vec<&str> = outcome.items.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["k1", "k2", "k3", "k4"]);
    assert_eq!(outcome.pages, 2);
}

#[tokio::test]
async fn test_export_preserves_listing_order_and_hydrates() {
    let server = MockServer::start().await;

    // k1 carries metadata in the listing; k2 needs the metadata endpoint.
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([
                {"name": "k1", "expiration": 1893456000, "metadata": {"tag": "old"}},
                {"name": "k2"},
                {"name": "k3"}
            ]),
            "",
        )))
        .mount(&server)
        .await;
    for (key, value) in [("k1", "v1"), ("k2", "v2"), ("k3", "v3")] {
        Mock::given(method("GET"))
            .and(path(value_path(key)))
            .respond_with(ResponseTemplate::new(200).set_body_string(value))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(metadata_path("k2")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!({"tag": "new"}))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metadata_path("k3")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope(10017, "no metadata")),
        )
        .mount(&server)
        .await;

    let outcome = exporter(&server)
        .export_namespace(&ListOptions::default(), Some(8))
        .await
        .unwrap();

    assert_eq!(outcome.entries.len(), 3);
    // Output order is the listing order despite unordered pool completion.
    assert_eq!(outcome.entries[0].key, "k1");
    assert_eq!(outcome.entries[1].key, "k2");
    assert_eq!(outcome.entries[2].key, "k3");

    assert_eq!(outcome.entries[0].value.as_deref(), Some("v1"));
    assert_eq!(outcome.entries[0].expiration, Some(1893456000));
    assert_eq!(outcome.entries[0].metadata.as_ref().unwrap()["tag"], "old");
    assert_eq!(outcome.entries[1].metadata.as_ref().unwrap()["tag"], "new");
    assert!(outcome.entries[2].metadata.is_none());

    // k1's metadata came from the listing, so only k2 and k3 hit the
    // metadata endpoint.
    let metadata_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().contains("/metadata/"))
        .count();
    assert_eq!(metadata_calls, 2);
}

#[tokio::test]
async fn test_fetch_failures_reported_per_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "ok", "metadata": {}}, {"name": "broken", "metadata": {}}]),
            "",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(value_path("ok")))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(value_path("broken")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let outcome = exporter(&server)
        .export_namespace(&ListOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].key, "ok");
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].key, "broken");
}

#[tokio::test]
async fn test_fetch_deadline_reports_unfetched_keys_as_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "k1", "metadata": {}}, {"name": "k2", "metadata": {}}]),
            "",
        )))
        .mount(&server)
        .await;
    // Every value fetch outlasts the batch deadline.
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(400))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let exporter = exporter(&server)
        .with_fetch_deadline(std::time::Duration::from_millis(100));
    let outcome = exporter
        .export_namespace(&ListOptions::default(), Some(1))
        .await
        .unwrap();

    // Every key lands in exactly one list, and the cut-off keys carry the
    // deadline cause.
    assert_eq!(outcome.entries.len() + outcome.failures.len(), 2);
    assert!(
        outcome
            .failures
            .iter()
            .any(|f| f.error.contains("deadline exceeded")),
        "expected a deadline failure, got {:?}",
        outcome.failures
    );
}

#[tokio::test]
async fn test_stream_keys_delivers_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "k1"}, {"name": "k2"}]),
            "",
        )))
        .mount(&server)
        .await;

    let collected = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = collected.clone();
    let warnings = exporter(&server)
        .stream_keys(&ListOptions::default(), move |entries| {
            let sink = sink.clone();
            async move {
                sink.lock()
                    .unwrap()
                    .extend(entries.into_iter().map(|e| e.name));
                Ok(())
            }
        })
        .await
        .unwrap();

    assert!(warnings.is_empty());
    assert_eq!(*collected.lock().unwrap(), vec!["k1", "k2"]);
}
