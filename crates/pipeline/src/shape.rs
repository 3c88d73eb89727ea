//! Recognition of the reply shapes the orchestrator acts on.
//!
//! Only two shapes carry meaning: a list of books, or an explanation of
//! why there are none. Anything else is unrecognized.

use domain::{Book, DomainError, Result};
use serde_json::Value;
use tracing::warn;

use crate::classifier::Classified;

/// The shape of a classified model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyShape {
    /// `{"books": [...], "further_chat": "..."}`
    Books {
        books: Vec<Book>,
        further_chat: Option<String>,
    },
    /// `{"no_matches_found": "..."}`
    NoMatches(String),
    /// Unstructured text or a document of any other shape.
    Unrecognized,
}

impl ReplyShape {
    /// Recognize the shape of a classified reply.
    ///
    /// A `books` array wins over `no_matches_found` when both are present.
    /// Book entries that cannot be decoded are skipped with a warning.
    pub fn from_classified(classified: &Classified) -> Self {
        if !classified.is_structured {
            return ReplyShape::Unrecognized;
        }
        let Some(reply) = classified.data.as_object() else {
            return ReplyShape::Unrecognized;
        };

        if let Some(entries) = reply.get("books") {
            match decode_books(entries) {
                Ok(books) => {
                    let further_chat = reply
                        .get("further_chat")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    return ReplyShape::Books {
                        books,
                        further_chat,
                    };
                }
                Err(e) => warn!("Ignoring books field: {}", e),
            }
        }

        if let Some(reason) = reply.get("no_matches_found") {
            let reason = match reason {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            return ReplyShape::NoMatches(reason);
        }

        ReplyShape::Unrecognized
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReplyShape::Books { .. } => "books",
            ReplyShape::NoMatches(_) => "no_matches",
            ReplyShape::Unrecognized => "unrecognized",
        }
    }
}

/// Decode a `books` array, skipping entries that are not valid books.
pub fn decode_books(entries: &Value) -> Result<Vec<Book>> {
    let Some(entries) = entries.as_array() else {
        return Err(DomainError::UnexpectedType {
            field: "books".to_string(),
            expected: "array",
        });
    };

    let books = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match decode_book(index, entry) {
            Ok(book) => Some(book),
            Err(e) => {
                warn!("Skipping book: {}", e);
                None
            }
        })
        .collect();
    Ok(books)
}

fn decode_book(index: usize, entry: &Value) -> Result<Book> {
    let mut book: Book =
        serde_json::from_value(entry.clone()).map_err(|e| DomainError::MalformedBook {
            index,
            reason: e.to_string(),
        })?;
    // Enrichment fields only ever come from the catalog
    book.details = None;
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use serde_json::json;

    #[test]
    fn test_books_shape() {
        let classified = classify(
            r#"{"books": [{"title": "Dune", "author_name": "Frank Herbert", "isbn": "123", "brief_description": "Sand."}], "further_chat": "Want more?"}"#,
        );

        match ReplyShape::from_classified(&classified) {
            ReplyShape::Books {
                books,
                further_chat,
            } => {
                assert_eq!(books.len(), 1);
                assert_eq!(books[0].title, "Dune");
                assert_eq!(books[0].lookup_key(), Some("123"));
                assert_eq!(further_chat.as_deref(), Some("Want more?"));
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_no_matches_shape() {
        let classified = classify(json!({"no_matches_found": "Too vague."}));
        assert_eq!(
            ReplyShape::from_classified(&classified),
            ReplyShape::NoMatches("Too vague.".to_string())
        );
    }

    #[test]
    fn test_books_take_precedence_over_no_matches() {
        let classified = classify(json!({"books": [], "no_matches_found": "x"}));
        assert_eq!(ReplyShape::from_classified(&classified).name(), "books");
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert_eq!(
            ReplyShape::from_classified(&classify("just text")),
            ReplyShape::Unrecognized
        );
        assert_eq!(
            ReplyShape::from_classified(&classify(json!({"answer": 1}))),
            ReplyShape::Unrecognized
        );
        assert_eq!(
            ReplyShape::from_classified(&classify(json!([{"title": "Dune"}]))),
            ReplyShape::Unrecognized
        );
    }

    #[test]
    fn test_non_array_books_falls_through() {
        let classified = classify(json!({"books": "Dune", "no_matches_found": "odd"}));
        assert_eq!(
            ReplyShape::from_classified(&classified),
            ReplyShape::NoMatches("odd".to_string())
        );

        let classified = classify(json!({"books": "Dune"}));
        assert_eq!(ReplyShape::from_classified(&classified), ReplyShape::Unrecognized);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let books = decode_books(&json!([
            {"title": "Dune", "author_name": "Frank Herbert"},
            {"author_name": "No Title"},
            "not an object",
            {"title": "Hyperion", "author_name": "Dan Simmons", "isbn": null}
        ]))
        .unwrap();

        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Dune", "Hyperion"]);
    }

    #[test]
    fn test_model_supplied_detail_fields_are_dropped() {
        let books = decode_books(&json!([{
            "title": "Dune",
            "author_name": "Frank Herbert",
            "ratings_average": "5.00",
            "ratings_count": "1",
            "number_of_pages_median": "1",
            "first_publish_year": "1",
            "ratings_count_1": "1",
            "ratings_count_2": "1",
            "ratings_count_3": "1",
            "ratings_count_4": "1",
            "ratings_count_5": "1"
        }]))
        .unwrap();

        assert!(books[0].details.is_none());
    }
}
