//! Integration tests against a mock Open Library search endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use catalog_client::{EnrichmentFetcher, FetchConfig};
use domain::Outcome;
use serde_json::json;

#[derive(Clone, Default)]
struct MockCatalog {
    hits: Arc<AtomicUsize>,
}

async fn search(
    State(catalog): State<MockCatalog>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    catalog.hits.fetch_add(1, Ordering::SeqCst);

    match params.get("isbn").map(String::as_str) {
        Some("9780441013593") => Json(json!({
            "numFound": 1,
            "docs": [{
                "title": "Dune",
                "ratings_average": 4.2567,
                "ratings_count": 1532,
                "number_of_pages_median": 604,
                "first_publish_year": 1965,
                "ratings_count_1": 20,
                "ratings_count_5": 900
            }]
        }))
        .into_response(),
        Some("0000000000") => Json(json!({"numFound": 0, "docs": []})).into_response(),
        Some("garbage") => (StatusCode::OK, "<html>not json</html>").into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

/// Start the mock catalog on a random port, returning its search URL.
async fn start_mock_catalog(catalog: MockCatalog) -> anyhow::Result<String> {
    let app = Router::new()
        .route("/search.json", get(search))
        .with_state(catalog);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{}/search.json", addr))
}

fn config() -> FetchConfig {
    FetchConfig::default()
        .with_retries_per_key(2)
        .with_per_attempt_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_open_library_lookup_normalizes_first_record() -> anyhow::Result<()> {
    let catalog = MockCatalog::default();
    let endpoint = start_mock_catalog(catalog.clone()).await?;
    let fetcher = EnrichmentFetcher::open_library(endpoint, config())?;

    let outcomes = fetcher.fetch(["9780441013593"]).await;

    let details = match &outcomes["9780441013593"] {
        Outcome::Success(details) => details,
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(details.ratings_average, "4.26");
    assert_eq!(details.ratings_count, "1532");
    assert_eq!(details.number_of_pages_median, "604");
    assert_eq!(details.first_publish_year, "1965");
    assert_eq!(details.ratings_count_1, "20");
    assert_eq!(details.ratings_count_2, "");
    assert_eq!(details.ratings_count_5, "900");
    assert_eq!(catalog.hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_open_library_no_docs_is_empty() -> anyhow::Result<()> {
    let catalog = MockCatalog::default();
    let endpoint = start_mock_catalog(catalog.clone()).await?;
    let fetcher = EnrichmentFetcher::open_library(endpoint, config())?;

    let outcomes = fetcher.fetch(["0000000000"]).await;

    assert_eq!(outcomes["0000000000"], Outcome::Empty);
    assert_eq!(catalog.hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_open_library_server_error_is_retried_then_failed() -> anyhow::Result<()> {
    let catalog = MockCatalog::default();
    let endpoint = start_mock_catalog(catalog.clone()).await?;
    let fetcher = EnrichmentFetcher::open_library(endpoint, config().with_retries_per_key(3))?;

    let outcomes = fetcher.fetch(["1111111111"]).await;

    assert_eq!(outcomes["1111111111"], Outcome::Failed);
    assert_eq!(catalog.hits.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_open_library_non_json_body_fails() -> anyhow::Result<()> {
    let catalog = MockCatalog::default();
    let endpoint = start_mock_catalog(catalog.clone()).await?;
    let fetcher = EnrichmentFetcher::open_library(endpoint, config())?;

    let outcomes = fetcher.fetch(["garbage"]).await;

    assert_eq!(outcomes["garbage"], Outcome::Failed);
    assert_eq!(catalog.hits.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_open_library_mixed_batch() -> anyhow::Result<()> {
    let catalog = MockCatalog::default();
    let endpoint = start_mock_catalog(catalog.clone()).await?;
    let fetcher = EnrichmentFetcher::open_library(endpoint, config())?;

    let outcomes = fetcher
        .fetch(["9780441013593", "0000000000", "1111111111", "9780441013593"])
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes["9780441013593"], Outcome::Success(_)));
    assert_eq!(outcomes["0000000000"], Outcome::Empty);
    assert_eq!(outcomes["1111111111"], Outcome::Failed);
    // One hit each for the good keys, two attempts for the failing one
    assert_eq!(catalog.hits.load(Ordering::SeqCst), 4);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_without_panicking() -> anyhow::Result<()> {
    let fetcher = EnrichmentFetcher::open_library(
        "http://127.0.0.1:9/search.json",
        config().with_per_attempt_timeout(Duration::from_millis(500)),
    )?;

    let outcomes = fetcher.fetch(["9780441013593"]).await;

    assert_eq!(outcomes["9780441013593"], Outcome::Failed);
    Ok(())
}
