//! Integration tests for the sync page loop using wiremock HTTP mocks.

use std::path::Path;
use std::time::Duration;

use nsw_storage::{BackoffPolicy, SnapshotStore};
use nsw_sync::{SyncConfig, SyncEngine, SyncOutcome};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str, data_dir: &Path) -> SyncConfig {
    let mut config = SyncConfig::from_lookup(|key| match key {
        "NAVER_CLIENT_ID" => Some("test-id".to_string()),
        "NAVER_CLIENT_SECRET" => Some("test-secret".to_string()),
        "NSW_QUERY" => Some("티니핑".to_string()),
        _ => None,
    })
    .expect("credentials are present");
    config.base_url = base_url.to_string();
    config.data_dir = data_dir.to_path_buf();
    // Keep retries out of the way unless a test opts in.
    config.backoff = BackoffPolicy {
        max_retries: 0,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
    };
    config
}

fn listing(product_id: &str, title: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "link": format!("https://shopping.example/{product_id}"),
        "image": "",
        "lprice": "12900",
        "hprice": "",
        "mallName": "한터몰",
        "productId": product_id,
        "productType": "1",
        "brand": "티니핑",
        "maker": "에스에이엠지",
        "category1": "출산/육아",
        "category2": "완구",
        "category3": "",
        "category4": ""
    })
}

fn page(total: u64, items: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "lastBuildDate": "Fri, 28 Aug 2026 00:00:00 +0900",
        "total": total,
        "start": 1,
        "display": items.len(),
        "items": items,
    })
}

#[tokio::test]
async fn overlapping_pages_are_deduplicated_in_first_seen_order() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("query", "티니핑"))
        .and(query_param("display", "100"))
        .and(query_param("start", "1"))
        .and(header("X-Naver-Client-Id", "test-id"))
        .and(header("X-Naver-Client-Secret", "test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            3,
            vec![listing("1", "가 인형"), listing("2", "나 인형")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("start", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            3,
            vec![listing("2", "나 인형"), listing("3", "다 인형")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let engine = SyncEngine::new(test_config(&server.uri(), dir.path())).unwrap();
    let summary = engine.run_once().await.unwrap();

    assert_eq!(summary.outcome, SyncOutcome::Complete);
    assert_eq!(summary.collected, 3);
    assert_eq!(summary.pages_fetched, 2);

    let snapshot = SnapshotStore::new(dir.path()).load().await.unwrap();
    assert_eq!(snapshot.total, 3);
    let ids: Vec<_> = snapshot.items.iter().map(|i| i.product_id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"], "first-seen order, no duplicate keys");
}

#[tokio::test]
async fn empty_page_stops_the_loop_before_the_total_is_reached() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            10,
            vec![listing("1", "가"), listing("2", "나")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("start", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(10, vec![])))
        .expect(1)
        .mount(&server)
        .await;
    // No request for start=3 may ever be issued.
    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("start", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(10, vec![])))
        .expect(0)
        .mount(&server)
        .await;

    let engine = SyncEngine::new(test_config(&server.uri(), dir.path())).unwrap();
    let summary = engine.run_once().await.unwrap();

    assert_eq!(summary.outcome, SyncOutcome::Exhausted);
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.reported_total, 10);
}

#[tokio::test]
async fn start_index_ceiling_truncates_without_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // Every page reports far more items than the ceiling allows and keeps
    // returning the same two listings, so the accumulator never catches up.
    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            5000,
            vec![listing("1", "가"), listing("2", "나")],
        )))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri(), dir.path());
    config.max_start = 3;
    let engine = SyncEngine::new(config).unwrap();
    let summary = engine.run_once().await.unwrap();

    assert_eq!(summary.outcome, SyncOutcome::Truncated);
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.reported_total, 5000);

    let snapshot = SnapshotStore::new(dir.path()).load().await.unwrap();
    assert_eq!(snapshot.items.len(), 2);
}

#[tokio::test]
async fn failed_page_fetch_keeps_the_partial_result() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            5,
            vec![listing("1", "가"), listing("2", "나")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("start", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let engine = SyncEngine::new(test_config(&server.uri(), dir.path())).unwrap();
    let summary = engine.run_once().await.unwrap();

    assert_eq!(summary.outcome, SyncOutcome::FetchFailed);
    assert_eq!(summary.collected, 2, "run does not abort on a failed page");

    let snapshot = SnapshotStore::new(dir.path()).load().await.unwrap();
    assert_eq!(snapshot.items.len(), 2);
}

#[tokio::test]
async fn transient_server_errors_are_retried_before_giving_up() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // First attempt 500s, the retry succeeds and completes the run.
    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop.json"))
        .and(query_param("start", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(1, vec![listing("1", "가")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri(), dir.path());
    config.backoff = BackoffPolicy {
        max_retries: 1,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
    };
    let engine = SyncEngine::new(config).unwrap();
    let summary = engine.run_once().await.unwrap();

    assert_eq!(summary.outcome, SyncOutcome::Complete);
    assert_eq!(summary.collected, 1);
}
