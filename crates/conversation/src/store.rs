//! Session store: one independently lockable history per session key.
//!
//! Requests for different sessions never contend on a shared lock beyond
//! the brief map lookup; requests for the same session are serialized by
//! that session's own mutex, which an [`Exchange`] holds from the
//! augmented append until the raw turns are committed.

use std::collections::HashMap;
use std::sync::Arc;

use domain::{Role, SessionKey, Turn};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, instrument, warn};

use crate::augment::{BookSearchPrompt, PromptAugmentor};
use crate::history::{AppendMode, SessionHistory};

type SessionRecord = Arc<Mutex<SessionHistory>>;

/// In-memory map of session histories.
///
/// Cloning is cheap and every clone shares the same sessions.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionKey, SessionRecord>>>,
    augmentor: Arc<dyn PromptAugmentor>,
}

impl SessionStore {
    /// Create an empty store using [`BookSearchPrompt`] for augmentation.
    pub fn new() -> Self {
        Self::with_augmentor(Arc::new(BookSearchPrompt))
    }

    /// Create an empty store with a custom prompt augmentor.
    pub fn with_augmentor(augmentor: Arc<dyn PromptAugmentor>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            augmentor,
        }
    }

    /// Fetch the record for `session_key`, creating it on first touch.
    async fn record(&self, session_key: &str) -> SessionRecord {
        if let Some(record) = self.sessions.read().await.get(session_key) {
            return record.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_key.to_string())
            .or_insert_with(|| {
                debug!("Creating session {}", session_key);
                Arc::new(Mutex::new(SessionHistory::new()))
            })
            .clone()
    }

    /// Append `message` to a session.
    ///
    /// This is the low-level primitive. With [`AppendMode::Augmented`] the
    /// caller must remove the augmented turn again with
    /// [`Self::pop_augmented`] before the next raw append;
    /// [`Self::begin_exchange`] does that automatically and should be
    /// preferred.
    pub async fn append(&self, session_key: &str, message: &str, role: Role, mode: AppendMode) {
        let record = self.record(session_key).await;
        let mut history = record.lock().await;
        history.append(role, message, mode, self.augmentor.as_ref());
    }

    /// Remove the augmented turn at the tail of a session, if any.
    ///
    /// Unseen sessions are left uncreated.
    pub async fn pop_augmented(&self, session_key: &str) -> Option<Turn> {
        let record = self.sessions.read().await.get(session_key).cloned()?;
        let popped = record.lock().await.pop_augmented();
        if popped.is_some() {
            debug!("Removed augmented turn from session {}", session_key);
        }
        popped
    }

    /// Current turns of a session.
    ///
    /// An unseen key yields the two bootstrap turns without creating the
    /// session.
    pub async fn read(&self, session_key: &str) -> Vec<Turn> {
        let record = self.sessions.read().await.get(session_key).cloned();
        match record {
            Some(record) => record.lock().await.turns().to_vec(),
            None => SessionHistory::new().turns().to_vec(),
        }
    }

    /// Start a two-phase exchange for `message`.
    ///
    /// Waits for any in-flight exchange on the same session, then appends
    /// the augmented turn. The returned handle keeps the session locked
    /// until it is committed, aborted or dropped.
    #[instrument(skip(self, message))]
    pub async fn begin_exchange(&self, session_key: &str, message: impl Into<String>) -> Exchange {
        let message = message.into();
        let record = self.record(session_key).await;
        let mut history = record.lock_owned().await;
        history.append_augmented(Role::User, &message, self.augmentor.as_ref());
        debug!("Exchange started (turns: {})", history.len());

        Exchange {
            session_key: session_key.to_string(),
            message,
            history,
            finished: false,
        }
    }

    /// Number of sessions created so far.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-flight exchange holding its session's lock.
///
/// Complete it with [`Exchange::commit`] once the model replied, or
/// [`Exchange::abort`] when the call failed. Dropping an exchange that
/// was never committed aborts it.
pub struct Exchange {
    session_key: SessionKey,
    message: String,
    history: OwnedMutexGuard<SessionHistory>,
    finished: bool,
}

impl Exchange {
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// The raw user message this exchange was started with.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The full turn sequence to send to the model, augmented turn last.
    pub fn outbound_turns(&self) -> Vec<Turn> {
        self.history.turns().to_vec()
    }

    /// Replace the augmented turn with the raw user message and `reply`.
    pub fn commit(mut self, reply: &str) {
        self.history.pop_augmented();
        let message = std::mem::take(&mut self.message);
        self.history.append_raw(Role::User, message);
        self.history.append_raw(Role::Assistant, reply);
        self.finished = true;
        debug!(
            "Exchange committed for session {} (turns: {})",
            self.session_key,
            self.history.len()
        );
    }

    /// Remove the augmented turn without recording anything.
    pub fn abort(mut self) {
        self.history.pop_augmented();
        self.finished = true;
        debug!("Exchange aborted for session {}", self.session_key);
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "Exchange for session {} dropped without commit, discarding augmented turn",
                self.session_key
            );
            self.history.pop_augmented();
        }
    }
}
