//! Request gates run before a query reaches the model.
//!
//! Gates run in the order they were added; the first one to reject a
//! request answers it and the rest never see it. A rejected request does
//! not touch session state.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use domain::{QueryRequest, SearchResponse, SessionKey};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::debug;

/// Notice returned when a query contains a blocked word.
pub const MODERATION_NOTICE: &str = "Please note that this Book Search service is moderated \
     and does not tolerate the use of profanity.";

/// Message returned when a session queries faster than allowed.
pub const RATE_LIMITED_MESSAGE: &str =
    "You're sending requests too quickly. Please wait a moment and try again.";

/// Words blocked unless the configuration turns the built-in list off.
///
/// Words that also appear in common titles or author names ("Moby Dick",
/// "Philip K. Dick") are left out.
pub const DEFAULT_BLOCKED_WORDS: &[&str] = &[
    "fuck",
    "fucks",
    "fucked",
    "fucker",
    "fucking",
    "motherfucker",
    "shit",
    "shits",
    "shitty",
    "bullshit",
    "bitch",
    "bitches",
    "asshole",
    "assholes",
    "cunt",
    "cunts",
    "twat",
    "wanker",
    "dickhead",
    "slut",
    "whore",
];

/// Rate limiter sessions are pruned every this many checks.
const PRUNE_EVERY_CHECKS: usize = 256;

/// A check that may answer a request before it reaches the model.
pub trait RequestGate: Send + Sync {
    /// Returns the name of this gate (for logging/debugging)
    fn name(&self) -> &str;

    /// `Some(response)` rejects the request with that response.
    fn check(&self, request: &QueryRequest) -> Option<SearchResponse>;
}

/// Rejects queries containing any blocked word.
///
/// Matching is case-insensitive on whole words, so "class" does not
/// trip a block on "ass".
#[derive(Debug, Clone, Default)]
pub struct ProfanityGate {
    blocked: HashSet<String>,
}

impl ProfanityGate {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blocked = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        Self { blocked }
    }

    /// Gate over [`DEFAULT_BLOCKED_WORDS`].
    pub fn with_default_words() -> Self {
        Self::new(DEFAULT_BLOCKED_WORDS)
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    fn contains_blocked_word(&self, text: &str) -> bool {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| self.blocked.contains(&word.to_lowercase()))
    }
}

impl RequestGate for ProfanityGate {
    fn name(&self) -> &str {
        "ProfanityGate"
    }

    fn check(&self, request: &QueryRequest) -> Option<SearchResponse> {
        if self.contains_blocked_word(&request.query) {
            debug!("Blocked word in query for session {}", request.session_id);
            return Some(SearchResponse::profanity(MODERATION_NOTICE));
        }
        None
    }
}

/// Enforces a minimum interval between accepted queries of one session.
///
/// Backed by a keyed GCRA limiter with a burst of one. A rejected query
/// does not push the window back. Sessions idle for longer than the
/// interval are dropped from the limiter periodically.
pub struct RateLimitGate {
    min_interval: Duration,
    limiter: Option<DefaultKeyedRateLimiter<SessionKey>>,
    checks: AtomicUsize,
}

impl RateLimitGate {
    /// A zero interval disables the gate.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| RateLimiter::keyed(quota.allow_burst(NonZeroU32::MIN)));
        Self {
            min_interval,
            limiter,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Number of sessions the limiter currently remembers.
    pub fn tracked_sessions(&self) -> usize {
        self.limiter.as_ref().map_or(0, |limiter| limiter.len())
    }

    /// Forget sessions whose interval has fully elapsed.
    pub fn prune(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
            debug!("Rate limiter tracking {} sessions after prune", limiter.len());
        }
    }
}

impl RequestGate for RateLimitGate {
    fn name(&self) -> &str {
        "RateLimitGate"
    }

    fn check(&self, request: &QueryRequest) -> Option<SearchResponse> {
        let limiter = self.limiter.as_ref()?;

        let verdict = limiter.check_key(&request.session_id);
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % PRUNE_EVERY_CHECKS == 0 {
            self.prune();
        }

        match verdict {
            Ok(()) => None,
            Err(_) => {
                debug!("Session {} rate limited", request.session_id);
                Some(SearchResponse::message(RATE_LIMITED_MESSAGE))
            }
        }
    }
}
