//! Reply processing for the book recommendation service.
//!
//! This crate provides:
//! - `classify` for telling structured model replies from plain text
//! - `ReplyShape` for recognizing book lists and "no matches" replies
//! - `merge` for joining catalog metadata back onto recommended books
//!
//! ## Architecture
//! A reply flows through the stages in order:
//! 1. The classifier parses the raw reply, if it can
//! 2. The shape recognizer extracts books (or the no-match reason)
//! 3. After catalog lookups, the merger rebuilds the list in its
//!    original order, applying the [`UnenrichedPolicy`]
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{classify, lookup_keys, merge, ReplyShape, UnenrichedPolicy};
//!
//! let classified = classify(reply_text);
//! if let ReplyShape::Books { books, .. } = ReplyShape::from_classified(&classified) {
//!     let outcomes = fetcher.fetch(lookup_keys(&books)).await;
//!     let enriched = merge(books, &outcomes, UnenrichedPolicy::Exclude);
//! }
//! ```

pub mod classifier;
pub mod merger;
pub mod shape;

// Re-export main types
pub use classifier::{classify, Classified, ModelReply};
pub use merger::{lookup_keys, merge, UnenrichedPolicy};
pub use shape::{decode_books, ReplyShape};
