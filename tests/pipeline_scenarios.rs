//! End-to-end pipeline scenarios over a mocked HTTP catalog.
//!
//! These tests drive the public API only: intents in, watch channels out.
//! Each test gets its own mock server and its own file-backed favorites
//! database for isolation.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use vitrine::{
    CatalogPipeline, Category, FavoriteRecord, FavoritesStore, FetchError, LoadState,
    RemoteCatalogFetcher,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page_body(prefix: &str, count: usize) -> String {
    let results: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"uid": "{prefix}-{i}", "name": "{prefix} {i}",
                     "thumbnails": {{"images": [{{"url": "https://img/{prefix}-{i}.jpg", "width": 256, "height": 256}}]}}}}"#
            )
        })
        .collect();
    format!(r#"{{"results": [{}]}}"#, results.join(","))
}

async fn test_store() -> (FavoritesStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("favorites.db");
    let store = FavoritesStore::open(path.to_str().unwrap()).await.unwrap();
    (store, dir)
}

fn pipeline_for(server: &MockServer, store: FavoritesStore, page_size: usize) -> CatalogPipeline {
    let fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), server.uri());
    CatalogPipeline::spawn(Arc::new(fetcher), store, page_size)
}

/// Wait until `pred` holds on the watch value. Panics after 10 seconds.
async fn wait_until<T: Clone>(rx: &mut watch::Receiver<T>, mut pred: impl FnMut(&T) -> bool) -> T {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if pred(&current) {
                    return (*current).clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("watch condition not met in time")
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_refresh_plus_append_reaches_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body("table", 20)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body("extra", 5)))
        .expect(1)
        .mount(&server)
        .await;

    let (store, _dir) = test_store().await;
    let pipeline = pipeline_for(&server, store, 20);
    let mut refresh = pipeline.refresh_state();
    let mut append = pipeline.append_state();
    let mut items = pipeline.items();

    pipeline.refresh();
    wait_until(&mut refresh, |s| *s == LoadState::NotLoading).await;
    assert_eq!(items.borrow_and_update().len(), 20);

    pipeline.load_next_page();
    wait_until(&mut append, |s| *s == LoadState::NotLoading).await;
    let visible = wait_until(&mut items, |i| i.len() == 25).await;
    assert_eq!(visible[0].product.id, "table-0");
    assert_eq!(visible[24].product.id, "extra-4");

    // The short second page exhausted the result set: further appends must
    // not reach the server (the offset=20 mock expects exactly one call).
    pipeline.load_next_page();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pipeline.items().borrow().len(), 25);
}

#[tokio::test]
async fn test_category_change_refetches_page_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("q", "table"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body("table", 3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", "desk"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body("desk", 2)))
        .mount(&server)
        .await;

    let (store, _dir) = test_store().await;
    let pipeline = pipeline_for(&server, store, 20);
    let mut items = pipeline.items();

    pipeline.refresh();
    wait_until(&mut items, |i| i.len() == 3).await;

    pipeline.set_category(Category::Desk);
    let visible = wait_until(&mut items, |i| {
        i.len() == 2 && i.iter().all(|a| a.product.id.starts_with("desk-"))
    })
    .await;
    assert_eq!(visible[0].product.name, "desk 0");
}

// ============================================================================
// Failure phases
// ============================================================================

#[tokio::test]
async fn test_refresh_failure_shows_empty_error_view() {
    // No server at all: connection refused maps to NetworkUnavailable.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (store, _dir) = test_store().await;
    let fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), format!("http://{}", addr));
    let pipeline = CatalogPipeline::spawn(Arc::new(fetcher), store, 20);
    let mut refresh = pipeline.refresh_state();

    pipeline.refresh();
    let state = wait_until(&mut refresh, |s| s.is_failed()).await;
    assert_eq!(state, LoadState::Failed(FetchError::NetworkUnavailable));
    assert!(pipeline.items().borrow().is_empty());
}

#[tokio::test]
async fn test_append_failure_keeps_existing_items_visible() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body("table", 10)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("offset", "10"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (store, _dir) = test_store().await;
    let pipeline = pipeline_for(&server, store, 10);
    let mut refresh = pipeline.refresh_state();
    let mut append = pipeline.append_state();

    pipeline.refresh();
    wait_until(&mut refresh, |s| *s == LoadState::NotLoading).await;

    pipeline.load_next_page();
    let state = wait_until(&mut append, |s| s.is_failed()).await;
    assert_eq!(state, LoadState::Failed(FetchError::ServerError(500)));
    assert_eq!(pipeline.items().borrow().len(), 10);
    assert_eq!(*pipeline.refresh_state().borrow(), LoadState::NotLoading);
}

// ============================================================================
// Favorites join
// ============================================================================

#[tokio::test]
async fn test_toggle_favorite_annotates_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body("table", 3)))
        .expect(1) // annotation flips must not refetch
        .mount(&server)
        .await;

    let (store, _dir) = test_store().await;
    let pipeline = pipeline_for(&server, store.clone(), 20);
    let mut items = pipeline.items();

    pipeline.refresh();
    wait_until(&mut items, |i| i.len() == 3).await;

    pipeline.toggle_favorite("table-2");
    let visible = wait_until(&mut items, |i| i.iter().any(|a| a.is_favorite)).await;
    assert!(visible[2].is_favorite);

    // Persisted with the product's display fields.
    let favorites = store.all().await;
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].product_id, "table-2");
    assert_eq!(favorites[0].name, "table 2");
    assert_eq!(favorites[0].thumbnail_url, "https://img/table-2.jpg");
}

#[tokio::test]
async fn test_external_favorite_change_reannotates_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body("sofa", 2)))
        .mount(&server)
        .await;

    let (store, _dir) = test_store().await;
    let pipeline = pipeline_for(&server, store.clone(), 20);
    let mut items = pipeline.items();

    pipeline.set_category(Category::Sofa);
    wait_until(&mut items, |i| i.len() == 2).await;

    // A different screen writes to the same store.
    store
        .add(FavoriteRecord::new("sofa-1", "sofa 1", ""))
        .await;
    let visible = wait_until(&mut items, |i| i.iter().any(|a| a.is_favorite)).await;
    assert!(visible[1].is_favorite);
    assert!(!visible[0].is_favorite);

    store.remove("sofa-1").await;
    wait_until(&mut items, |i| i.iter().all(|a| !a.is_favorite)).await;
}
