//! # Domain Crate
//!
//! Shared types for the ShelfRecs book recommendation service.
//!
//! ## Main Components
//!
//! - **types**: conversation turns, books, enrichment outcomes and the
//!   response shapes returned to callers
//! - **error**: errors raised while decoding model output into books

pub mod error;
pub mod types;

pub use error::{DomainError, Result};
pub use types::{
    // Type aliases
    Isbn,
    SessionKey,
    // Conversation
    Role,
    Turn,
    // Books
    Book,
    BookDetails,
    Outcome,
    // Requests and responses
    GenericMessage,
    QueryRequest,
    ResponseNoMatchesFound,
    ResponseProfanityFound,
    ResponseWithBooks,
    SearchResponse,
};
