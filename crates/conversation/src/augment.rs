//! Prompt augmentation for outbound book search queries.
//!
//! The wording of the instructions is not part of the conversation
//! contract; the state manager only needs something that turns a raw
//! query into the structured request text sent to the model.

/// Turns a raw user query into the instruction text sent to the model.
pub trait PromptAugmentor: Send + Sync {
    /// Returns the name of this augmentor (for logging/debugging)
    fn name(&self) -> &str;

    /// Wrap `query` in structured-output instructions.
    fn augment(&self, query: &str) -> String;
}

/// Default augmentor asking the model for a JSON book list.
///
/// The reply must be one JSON object, either
/// `{"books": [...], "further_chat": "..."}` or
/// `{"no_matches_found": "..."}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookSearchPrompt;

impl PromptAugmentor for BookSearchPrompt {
    fn name(&self) -> &str {
        "BookSearchPrompt"
    }

    fn augment(&self, query: &str) -> String {
        format!(
            r#"Recommend books for this search query:

'{query}'

If the query asks for a single book, recommend exactly one.

Reply with a single JSON object and nothing else: no markdown, no code fences.

The object must contain:
1. "books": a list of objects, each with
   - "title"
   - "author_name"
   - "isbn"
   - "brief_description" (around 50 words)
2. "further_chat": a short message, specific to this query, offering more help finding books.

If there is nothing to recommend, reply instead with an object holding a single
"no_matches_found" field explaining why."#
        )
    }
}
