//! Enrichment merging.
//!
//! Joins fetched catalog metadata back onto the candidate list. Output
//! order always follows the input order restricted to retained books;
//! completion order of the lookups never leaks through.

use std::collections::HashMap;
use std::fmt;

use domain::{Book, Isbn, Outcome};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to do with a book whose lookup produced no metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnenrichedPolicy {
    /// Keep the book with its original fields only.
    #[serde(alias = "include-unenriched")]
    Include,
    /// Drop the book from the result.
    #[default]
    #[serde(alias = "exclude-unenriched")]
    Exclude,
}

impl fmt::Display for UnenrichedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnenrichedPolicy::Include => write!(f, "include"),
            UnenrichedPolicy::Exclude => write!(f, "exclude"),
        }
    }
}

/// Lookup keys of `books` in order, duplicates included.
pub fn lookup_keys(books: &[Book]) -> Vec<Isbn> {
    books
        .iter()
        .filter_map(Book::lookup_key)
        .map(str::to_string)
        .collect()
}

/// Merge lookup outcomes onto `candidates`.
///
/// ## Rules
/// - a book without a lookup key is kept unchanged
/// - a `Success` outcome overlays its metadata, identity fields untouched
/// - `Empty`, `Failed`, or a key missing from `outcomes` follows `policy`
pub fn merge(
    candidates: Vec<Book>,
    outcomes: &HashMap<Isbn, Outcome>,
    policy: UnenrichedPolicy,
) -> Vec<Book> {
    let total = candidates.len();
    let merged: Vec<Book> = candidates
        .into_iter()
        .filter_map(|book| {
            let Some(key) = book.lookup_key() else {
                return Some(book);
            };
            match outcomes.get(key).and_then(Outcome::details) {
                Some(details) => Some(Book {
                    details: Some(details.clone()),
                    ..book
                }),
                None => match policy {
                    UnenrichedPolicy::Include => Some(Book {
                        details: None,
                        ..book
                    }),
                    UnenrichedPolicy::Exclude => {
                        debug!("Dropping unenriched book '{}' (isbn {})", book.title, key);
                        None
                    }
                },
            }
        })
        .collect();

    debug!(
        "Merged enrichment: {} candidates in, {} out (policy: {})",
        total,
        merged.len(),
        policy
    );
    merged
}
