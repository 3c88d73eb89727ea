//! Example: Enrich a handful of ISBNs against Open Library
//!
//! Run with: cargo run --package catalog-client --example lookup_isbns -- 9780441013593 9780547928227
//!
//! This example shows how to:
//! 1. Build an Open Library backed fetcher
//! 2. Fetch every key concurrently
//! 3. Display each outcome

use catalog_client::{EnrichmentFetcher, FetchConfig, OPEN_LIBRARY_SEARCH_URL};
use domain::Outcome;
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut keys: Vec<String> = std::env::args().skip(1).collect();
    if keys.is_empty() {
        keys = vec!["9780441013593".to_string(), "9780547928227".to_string()];
    }

    println!("=== ShelfRecs Enrichment Example ===\n");
    let fetcher = EnrichmentFetcher::open_library(OPEN_LIBRARY_SEARCH_URL, FetchConfig::default())?;

    let start = Instant::now();
    let outcomes = fetcher.fetch(&keys).await;
    println!("Fetched {} keys in {:?}\n", outcomes.len(), start.elapsed());

    for key in &keys {
        match outcomes.get(key.trim()) {
            Some(Outcome::Success(details)) => println!(
                "{}: rating {} ({} ratings), {} pages, first published {}",
                key,
                details.ratings_average,
                details.ratings_count,
                details.number_of_pages_median,
                details.first_publish_year
            ),
            Some(Outcome::Empty) => println!("{}: no catalog record", key),
            Some(Outcome::Failed) => println!("{}: lookup failed", key),
            None => println!("{}: skipped", key),
        }
    }

    Ok(())
}
