//! Filter engine integration tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use tokio_util::sync::CancellationToken;

use kvbulk_engine::{
    CancelCause, FilterEngine, FilterOptions, MetadataCache, MetadataFilter, ProgressTracker,
};

fn engine(server: &MockServer) -> FilterEngine {
    FilterEngine::new(
        test_client(server),
        NAMESPACE,
        CancellationToken::new(),
        Arc::new(ProgressTracker::new(None)),
    )
}

#[tokio::test]
async fn test_filter_empty_namespace() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(serde_json::json!([]), "")))
        .mount(&server)
        .await;

    let outcome = engine(&server)
        .run(&MetadataFilter::field("tag"), &FilterOptions::default())
        .await
        .unwrap();
    assert!(outcome.matched.is_empty());
    assert_eq!(outcome.summary.scanned, 0);
}

#[tokio::test]
async fn test_filter_uses_embedded_metadata_without_extra_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([
                {"name": "k1", "metadata": {"tag": "old"}},
                {"name": "k2", "metadata": {"tag": "new"}},
                {"name": "k3", "metadata": {"tag": "old"}}
            ]),
            "",
        )))
        .mount(&server)
        .await;

    let filter = MetadataFilter::field_equals("tag", "old");
    let outcome = engine(&server).run(&filter, &FilterOptions::default()).await.unwrap();

    let names: Vec<&str> = outcome.matched.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["k1", "k3"]);
    // Every returned entry satisfies the predicate against its carried
    // metadata.
    for entry in &outcome.matched {
        assert!(filter.matches(entry.metadata.as_ref().unwrap()));
    }

    // The listing carried the metadata, so only listing requests were made.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path().ends_with("/keys")));
}

#[tokio::test]
async fn test_filter_probes_metadata_endpoint_when_listing_omits_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "k1"}, {"name": "k2"}]),
            "",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metadata_path("k1")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!({"tag": "old"}))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metadata_path("k2")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope(10017, "no metadata")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = engine(&server)
        .run(&MetadataFilter::field_equals("tag", "old"), &FilterOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.matched.len(), 1);
    assert_eq!(outcome.matched[0].name, "k1");
    assert_eq!(outcome.summary.scanned, 2);
    assert_eq!(outcome.summary.matched, 1);
}

#[tokio::test]
async fn test_filter_cache_avoids_repeat_probes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "k1"}]),
            "",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metadata_path("k1")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(serde_json::json!({"tag": "old"}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MetadataCache::with_defaults());
    let engine = FilterEngine::new(
        test_client(&server),
        NAMESPACE,
        CancellationToken::new(),
        Arc::new(ProgressTracker::new(None)),
    )
    .with_cache(cache.clone());

    let filter = MetadataFilter::field("tag");
    let first = engine.run(&filter, &FilterOptions::default()).await.unwrap();
    // Second run hits the cache; the metadata endpoint stays at one call
    // (enforced by the mock's expect(1)).
    let second = engine.run(&filter, &FilterOptions::default()).await.unwrap();

    assert_eq!(first.matched.len(), 1);
    assert_eq!(second.matched.len(), 1);
    assert!(cache.stats().hits >= 1);
}

#[test]
fn test_default_deadline_is_the_metadata_batch_default() {
    assert_eq!(FilterOptions::default().deadline, Duration::from_secs(300));
}

#[tokio::test]
async fn test_probe_batch_deadline_cancels_with_deadline_cause() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "k1"}, {"name": "k2"}, {"name": "k3"}]),
            "",
        )))
        .mount(&server)
        .await;
    // Every probe is slower than the whole batch deadline.
    Mock::given(method("GET"))
        .and(path(metadata_path("k1")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(400))
                .set_body_json(success_envelope(serde_json::json!({"tag": "old"}))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(400))
                .set_body_json(success_envelope(serde_json::json!({"tag": "old"}))),
        )
        .mount(&server)
        .await;

    let options = FilterOptions {
        concurrency: Some(1),
        deadline: Duration::from_millis(100),
        ..Default::default()
    };
    let err = engine(&server)
        .run(&MetadataFilter::field("tag"), &options)
        .await
        .unwrap_err();

    // Expiry is a cancellation with the deadline cause, not a caller cancel
    // and not a fatal client error.
    assert_eq!(err.cancel_cause(), Some(CancelCause::DeadlineExceeded));
}

#[tokio::test]
async fn test_probe_errors_skip_key_but_keep_going() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys_page(
            serde_json::json!([{"name": "bad"}, {"name": "good", "metadata": {"tag": "old"}}]),
            "",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metadata_path("bad")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let outcome = engine(&server)
        .run(&MetadataFilter::field("tag"), &FilterOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.matched.len(), 1);
    assert_eq!(outcome.matched[0].name, "good");
    assert_eq!(outcome.summary.probe_failures.len(), 1);
    assert_eq!(outcome.summary.probe_failures[0].key, "bad");
}

#[tokio::test]
async fn test_filter_streams_chunks_across_pages() {
    let server = MockServer::start().await;

    let page1: Vec<serde_json::Value> = (0..30)
        .map(|i| serde_json::json!({"name": format!("k{i}"), "metadata": {"tag": "old"}}))
        .collect();
    let page2: Vec<serde_json::Value> = (30..45)
        .map(|i| serde_json::json!({"name": format!("k{i}"), "metadata": {"tag": "old"}}))
        .collect();

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .and(query_param("cursor", "c1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(keys_page(serde_json::json!(page2), "")),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(keys_page(serde_json::json!(page1), "c1")),
        )
        .with_priority(5)
        .mount(&server)
        .await;

    let options = FilterOptions {
        chunk_size: 10,
        ..Default::default()
    };
    let sizes = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sizes_sink = sizes.clone();
    let summary = engine(&server)
        .run_streaming(&MetadataFilter::field("tag"), &options, move |matched| {
            let sizes = sizes_sink.clone();
            async move {
                sizes.lock().unwrap().push(matched.len());
                Ok(())
            }
        })
        .await
        .unwrap();
    let chunk_sizes: Vec<usize> = sizes.lock().unwrap().clone();

    assert_eq!(summary.scanned, 45);
    assert_eq!(summary.matched, 45);
    assert_eq!(chunk_sizes.iter().sum::<usize>(), 45);
    // Chunk boundaries bound memory: no callback sees more than chunk_size.
    assert!(chunk_sizes.iter().all(|&n| n <= 10));
}
