//! Response classification.
//!
//! Decides whether a raw model reply is a structured document or opaque
//! text. Failing to parse is an expected outcome, not an error.

use serde_json::Value;

/// A reply as received from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Plain text, possibly holding a serialized document.
    Text(String),
    /// An already-parsed document.
    Structured(Value),
}

impl From<String> for ModelReply {
    fn from(text: String) -> Self {
        ModelReply::Text(text)
    }
}

impl From<&str> for ModelReply {
    fn from(text: &str) -> Self {
        ModelReply::Text(text.to_string())
    }
}

impl From<Value> for ModelReply {
    fn from(value: Value) -> Self {
        ModelReply::Structured(value)
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub is_structured: bool,
    /// The parsed document, or the original text as a JSON string.
    pub data: Value,
}

impl Classified {
    /// The original text of an unstructured reply.
    pub fn text(&self) -> Option<&str> {
        if self.is_structured {
            None
        } else {
            self.data.as_str()
        }
    }
}

/// Classify a model reply as structured or unstructured.
///
/// Text counts as structured only when it parses to a JSON object or
/// array; bare scalars like `42` or `"hi"` are left as text.
pub fn classify(reply: impl Into<ModelReply>) -> Classified {
    match reply.into() {
        ModelReply::Structured(data) => Classified {
            is_structured: true,
            data,
        },
        ModelReply::Text(text) => match serde_json::from_str::<Value>(&text) {
            Ok(data @ (Value::Object(_) | Value::Array(_))) => Classified {
                is_structured: true,
                data,
            },
            _ => Classified {
                is_structured: false,
                data: Value::String(text),
            },
        },
    }
}
