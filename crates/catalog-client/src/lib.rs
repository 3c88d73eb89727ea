//! Catalog enrichment client.
//!
//! Looks up books in the Open Library catalog by ISBN and normalizes the
//! first matching record into [`domain::BookDetails`].
//!
//! # Example
//! ```no_run
//! use catalog_client::{EnrichmentFetcher, FetchConfig, OPEN_LIBRARY_SEARCH_URL};
//!
//! # async fn run() -> Result<(), catalog_client::CatalogError> {
//! let fetcher = EnrichmentFetcher::open_library(OPEN_LIBRARY_SEARCH_URL, FetchConfig::default())?;
//! let outcomes = fetcher.fetch(["9780441013593", "9780547928227"]).await;
//! for (isbn, outcome) in &outcomes {
//!     println!("{}: {:?}", isbn, outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod transport;

pub use error::CatalogError;
pub use fetcher::{
    dedup_keys, EnrichmentFetcher, FetchConfig, DEFAULT_ATTEMPT_TIMEOUT,
    DEFAULT_CONCURRENCY_LIMIT, DEFAULT_RETRIES_PER_KEY,
};
pub use normalize::{first_record, normalize_record};
pub use transport::{CatalogTransport, OpenLibraryTransport, OPEN_LIBRARY_SEARCH_URL};
