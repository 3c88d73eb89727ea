//! Bounded, role-tagged history for a single session.
//!
//! A history starts with two bootstrap turns and grows through two kinds
//! of appends:
//! - **raw**: the message is stored verbatim and the history is clamped
//!   to the most recent [`HISTORY_WINDOW`] turns
//! - **augmented**: the message is wrapped with a rendering of earlier
//!   turns plus structured-output instructions; this turn exists only so
//!   it can be sent to the model and is removed again afterwards
//!
//! Prefer [`crate::SessionStore::begin_exchange`] over calling the
//! augmented path directly; it guarantees the augmented turn is removed.

use std::fmt::Write;

use domain::{Role, Turn};
use serde_json::Value;
use tracing::warn;

use crate::augment::PromptAugmentor;

/// Number of turns kept after a raw append.
pub const HISTORY_WINDOW: usize = 5;

/// First bootstrap turn, spoken by the user.
pub const BOOTSTRAP_PROMPT: &str = "Provide context for book recommendations.";

/// Second bootstrap turn, the assistant's acknowledgment.
pub const BOOTSTRAP_REPLY: &str =
    "I'm here to assist with book recommendations. What topic are you interested in?";

/// How a message is added to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendMode {
    /// Store the message verbatim, then clamp.
    Raw,
    /// Store a context-augmented rendering, for one outbound request.
    Augmented,
}

/// Ordered turns of one session.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    turns: Vec<Turn>,
    /// Bootstrap turns still at the head of `turns`
    bootstrap_remaining: usize,
    /// Whether the last turn is an augmented one
    augmented_tail: bool,
}

impl SessionHistory {
    /// Create a history seeded with the two bootstrap turns.
    pub fn new() -> Self {
        Self {
            turns: vec![Turn::user(BOOTSTRAP_PROMPT), Turn::assistant(BOOTSTRAP_REPLY)],
            bootstrap_remaining: 2,
            augmented_tail: false,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Whether the last turn is an augmented turn awaiting removal.
    pub fn has_augmented(&self) -> bool {
        self.augmented_tail
    }

    /// Number of bootstrap turns not yet evicted.
    pub fn bootstrap_remaining(&self) -> usize {
        self.bootstrap_remaining
    }

    /// Append using the given mode.
    pub fn append(
        &mut self,
        role: Role,
        message: &str,
        mode: AppendMode,
        augmentor: &dyn PromptAugmentor,
    ) {
        match mode {
            AppendMode::Raw => self.append_raw(role, message),
            AppendMode::Augmented => self.append_augmented(role, message, augmentor),
        }
    }

    /// Append `message` verbatim, then keep only the most recent
    /// [`HISTORY_WINDOW`] turns.
    pub fn append_raw(&mut self, role: Role, message: impl Into<String>) {
        if self.augmented_tail {
            warn!("Raw append on top of an augmented turn; the augmented turn becomes permanent");
            self.augmented_tail = false;
        }
        self.turns.push(Turn::new(role, message));
        self.clamp();
    }

    /// Append a context-augmented version of `message`.
    ///
    /// The synthesized content is the rendering of prior turns, a blank
    /// line, then `augmentor`'s instructions for `message`. No clamping
    /// happens here. An augmented turn already at the tail is replaced,
    /// so at most one exists at any time.
    pub fn append_augmented(&mut self, role: Role, message: &str, augmentor: &dyn PromptAugmentor) {
        self.pop_augmented();
        let content = format!("{}\n\n{}", self.render_prior_turns(), augmentor.augment(message));
        self.turns.push(Turn::new(role, content));
        self.augmented_tail = true;
    }

    /// Remove the augmented turn at the tail, if there is one.
    pub fn pop_augmented(&mut self) -> Option<Turn> {
        if !self.augmented_tail {
            return None;
        }
        self.augmented_tail = false;
        self.turns.pop()
    }

    /// Render the non-bootstrap turns with positional labels.
    ///
    /// Only bootstrap turns still inside the window are skipped. Once they
    /// have been evicted every surviving turn is rendered; the first two
    /// positions are not dropped blindly.
    ///
    /// Numbering starts at 1. The first rendered turn is labeled
    /// `(oldest)`, the last `(latest)`, the rest carry no label. A single
    /// turn is labeled `(oldest)`.
    pub fn render_prior_turns(&self) -> String {
        let end = if self.augmented_tail {
            self.turns.len() - 1
        } else {
            self.turns.len()
        };
        let prior = &self.turns[self.bootstrap_remaining.min(end)..end];
        let count = prior.len();

        let mut rendered = String::new();
        for (index, turn) in prior.iter().enumerate() {
            let label = if index == 0 {
                "(oldest) query"
            } else if index + 1 == count {
                "(latest) query"
            } else {
                "query"
            };
            let _ = writeln!(rendered, "- {}) {}:", index + 1, label);
            let _ = writeln!(rendered, "{}", summarize_turn(turn));
        }
        rendered
    }

    fn clamp(&mut self) {
        if self.turns.len() < HISTORY_WINDOW {
            return;
        }
        let dropped = self.turns.len() - HISTORY_WINDOW;
        if dropped > 0 {
            self.turns.drain(..dropped);
            self.bootstrap_remaining = self.bootstrap_remaining.saturating_sub(dropped);
        }
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Summarize a turn for the augmented rendering.
///
/// Assistant replies holding a book list collapse to one
/// `"<title> by <author>"` line per book; everything else is kept as is.
fn summarize_turn(turn: &Turn) -> String {
    if turn.role == Role::Assistant {
        if let Ok(Value::Object(reply)) = serde_json::from_str::<Value>(&turn.content) {
            if let Some(Value::Array(books)) = reply.get("books") {
                let lines: Vec<String> = books
                    .iter()
                    .filter_map(|book| {
                        let title = book.get("title")?.as_str()?;
                        let author = book.get("author_name")?.as_str()?;
                        Some(format!("{} by {}", title, author))
                    })
                    .collect();
                if !lines.is_empty() {
                    return lines.join("\n");
                }
            }
        }
    }
    turn.content.trim().to_string()
}
