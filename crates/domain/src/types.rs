//! Core domain types shared by every crate in the workspace.
//!
//! This module defines the conversation primitives (roles and turns),
//! the book records that flow through enrichment, and the response
//! shapes handed back to callers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Type Aliases
// =============================================================================

/// Opaque identifier for a conversation session.
pub type SessionKey = String;

/// Catalog identifier used to look up enrichment metadata for a book.
pub type Isbn = String;

// =============================================================================
// Conversation Types
// =============================================================================

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation, tagged with its speaker.
///
/// Turns are immutable once appended to a session; the only ordering
/// is insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// =============================================================================
// Book Types
// =============================================================================

/// A recommended book, optionally enriched with catalog metadata.
///
/// `details` is flattened on the wire, so an enriched book serializes as
/// one flat object carrying both identity and enrichment fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author_name: String,
    #[serde(default)]
    pub brief_description: String,
    /// Lookup key. Models sometimes emit numbers or `null` here.
    #[serde(default, deserialize_with = "lenient_isbn")]
    pub isbn: Option<Isbn>,
    #[serde(flatten)]
    pub details: Option<BookDetails>,
}

impl Book {
    pub fn new(
        title: impl Into<String>,
        author_name: impl Into<String>,
        brief_description: impl Into<String>,
        isbn: Option<&str>,
    ) -> Self {
        Self {
            title: title.into(),
            author_name: author_name.into(),
            brief_description: brief_description.into(),
            isbn: isbn.map(str::to_string),
            details: None,
        }
    }

    /// The key eligible for a catalog lookup, if any.
    ///
    /// Blank ISBNs count as missing.
    pub fn lookup_key(&self) -> Option<&str> {
        self.isbn
            .as_deref()
            .map(str::trim)
            .filter(|isbn| !isbn.is_empty())
    }

    /// Returns a copy carrying the given enrichment fields.
    pub fn enriched(&self, details: BookDetails) -> Self {
        Self {
            details: Some(details),
            ..self.clone()
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.details.is_some()
    }
}

/// Catalog metadata merged onto a [`Book`].
///
/// Every field is always present; values the catalog did not supply are
/// empty strings so downstream records keep a fixed shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    pub ratings_average: String,
    pub ratings_count: String,
    pub number_of_pages_median: String,
    pub first_publish_year: String,
    pub ratings_count_1: String,
    pub ratings_count_2: String,
    pub ratings_count_3: String,
    pub ratings_count_4: String,
    pub ratings_count_5: String,
}

/// Result of one catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The catalog returned a matching record.
    Success(BookDetails),
    /// The lookup succeeded but the catalog had no matching record.
    Empty,
    /// Every attempt failed (transport error, bad status or timeout).
    Failed,
}

impl Outcome {
    pub fn details(&self) -> Option<&BookDetails> {
        match self {
            Outcome::Success(details) => Some(details),
            Outcome::Empty | Outcome::Failed => None,
        }
    }
}

fn lenient_isbn<'de, D>(deserializer: D) -> Result<Option<Isbn>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// A book search query submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub session_id: SessionKey,
    pub query: String,
}

impl QueryRequest {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
        }
    }
}

/// A list of recommended books and a follow-up message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseWithBooks {
    pub books: Vec<Book>,
    #[serde(default)]
    pub further_chat: Option<String>,
}

/// The model found nothing to recommend and explained why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseNoMatchesFound {
    pub no_matches_found: String,
}

/// The query was rejected by the moderation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseProfanityFound {
    pub profanity_found: String,
}

/// A plain message: fallbacks, rate limiting and upstream failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericMessage {
    pub message: String,
}

/// Everything a search can answer with.
///
/// Serialized untagged so each variant keeps the field name that tells
/// clients which shape they received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Books(ResponseWithBooks),
    NoMatches(ResponseNoMatchesFound),
    Profanity(ResponseProfanityFound),
    Message(GenericMessage),
}

impl SearchResponse {
    pub fn message(text: impl Into<String>) -> Self {
        SearchResponse::Message(GenericMessage {
            message: text.into(),
        })
    }

    pub fn no_matches(reason: impl Into<String>) -> Self {
        SearchResponse::NoMatches(ResponseNoMatchesFound {
            no_matches_found: reason.into(),
        })
    }

    pub fn profanity(notice: impl Into<String>) -> Self {
        SearchResponse::Profanity(ResponseProfanityFound {
            profanity_found: notice.into(),
        })
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchResponse::Books(_) => "books",
            SearchResponse::NoMatches(_) => "no_matches",
            SearchResponse::Profanity(_) => "profanity",
            SearchResponse::Message(_) => "message",
        }
    }
}
