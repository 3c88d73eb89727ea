//! Errors for a single catalog lookup attempt.
//!
//! None of these reach the fetcher's caller: an attempt that fails with
//! any of them counts against the key's retry budget, and a key whose
//! budget runs out resolves to `Outcome::Failed`.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog returned status {status}")]
    Status { status: u16 },

    #[error("Invalid catalog response: {0}")]
    Decode(String),

    #[error("Catalog lookup timed out after {0:?}")]
    Timeout(Duration),
}
