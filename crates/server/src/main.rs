//! Simple test harness for the book search orchestrator.
//!
//! Sends one query through the full pipeline and logs the response.
//!
//! Usage: server [config.toml] [query...]

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use domain::{QueryRequest, SearchResponse};
use server::{BookSearchOrchestrator, Config};

#[tokio::main]
async fn main() -> Result<()> {
    server::init_tracing(
        "info,server=debug,conversation=debug,pipeline=debug,catalog_client=debug",
    );

    info!("Starting ShelfRecs server test harness");

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let query = {
        let rest: Vec<String> = args.collect();
        if rest.is_empty() {
            "Space opera with political intrigue".to_string()
        } else {
            rest.join(" ")
        }
    };

    let config = Config::load_or_default(config_path.as_deref()).context("Loading configuration")?;
    let orchestrator = BookSearchOrchestrator::from_config(&config)?;

    info!("Searching: {}", query);
    let response = orchestrator
        .search(QueryRequest::new("harness", query))
        .await;

    match &response {
        SearchResponse::Books(with_books) => {
            info!("Received {} books:", with_books.books.len());
            for (i, book) in with_books.books.iter().enumerate() {
                let rating = book
                    .details
                    .as_ref()
                    .map(|d| d.ratings_average.as_str())
                    .filter(|r| !r.is_empty())
                    .unwrap_or("n/a");
                info!("{}. {} by {} (rating: {})", i + 1, book.title, book.author_name, rating);
                info!("   {}", book.brief_description);
            }
            if let Some(further_chat) = &with_books.further_chat {
                info!("{}", further_chat);
            }
        }
        other => info!("{}", serde_json::to_string(other)?),
    }

    Ok(())
}
