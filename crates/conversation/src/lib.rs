//! # Conversation Crate
//!
//! Per-session conversation state for the book recommendation service.
//!
//! ## Components
//!
//! ### SessionHistory
//! The ordered turns of one session:
//! - Seeded with two bootstrap turns on creation
//! - Raw appends clamp the history to the last 5 turns
//! - Augmented appends wrap a query with earlier context for one
//!   outbound model call
//!
//! ### SessionStore
//! Maps session keys to independently locked histories and hands out
//! [`Exchange`] guards that run the two-phase update: augmented turn out,
//! raw turns in.
//!
//! ## Example Usage
//!
//! ```ignore
//! use conversation::SessionStore;
//!
//! let store = SessionStore::new();
//! let exchange = store.begin_exchange("session-1", "books about lighthouses").await;
//! let reply = model.complete(&exchange.outbound_turns()).await?;
//! exchange.commit(&reply);
//! ```

pub mod augment;
pub mod history;
pub mod store;

// Re-export commonly used types
pub use augment::{BookSearchPrompt, PromptAugmentor};
pub use history::{AppendMode, SessionHistory, BOOTSTRAP_PROMPT, BOOTSTRAP_REPLY, HISTORY_WINDOW};
pub use store::{Exchange, SessionStore};
