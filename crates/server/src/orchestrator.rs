//! # Book Search Orchestrator
//!
//! This module coordinates one search request end to end:
//! 1. Run the request gates (moderation, rate limiting)
//! 2. Start an exchange on the session and call the chat model
//! 3. Classify the reply and recognize its shape
//! 4. Commit the raw query and reply to the session history
//! 5. For book lists, fetch catalog metadata concurrently and merge it
//! 6. Return the response shape to the caller
//!
//! The exchange is committed before enrichment starts, so the session is
//! unlocked while catalog lookups run and enrichment never changes what
//! the history records.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument};

use catalog_client::EnrichmentFetcher;
use conversation::SessionStore;
use domain::{Book, QueryRequest, ResponseWithBooks, SearchResponse, Turn};
use llm_client::{ChatModel, OpenAiChatClient};
use pipeline::{classify, lookup_keys, merge, ReplyShape, UnenrichedPolicy};

use crate::config::{Config, ModerationConfig};
use crate::gates::{ProfanityGate, RateLimitGate, RequestGate};

/// Returned when the model reply is neither a book list nor a no-match.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, I couldn't find book recommendations for that. Could you rephrase your request?";

/// Returned when the chat model could not be reached.
pub const UPSTREAM_FAILURE_MESSAGE: &str =
    "The recommendation service is temporarily unavailable. Please try again shortly.";

/// Main orchestrator that answers book search requests
#[derive(Clone)]
pub struct BookSearchOrchestrator {
    sessions: SessionStore,
    model: Arc<dyn ChatModel>,
    fetcher: EnrichmentFetcher,
    policy: UnenrichedPolicy,
    gates: Arc<Vec<Box<dyn RequestGate>>>,
}

impl BookSearchOrchestrator {
    pub fn builder(model: Arc<dyn ChatModel>, fetcher: EnrichmentFetcher) -> OrchestratorBuilder {
        OrchestratorBuilder::new(model, fetcher)
    }

    /// Wire every component from a validated [`Config`].
    ///
    /// Reads the model API key from the configured environment variable.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client_config = config
            .model
            .client_config()
            .context("Configuring chat model")?;
        let model = OpenAiChatClient::new(client_config).context("Creating chat model client")?;
        let fetcher = EnrichmentFetcher::open_library(
            config.enrichment.catalog_endpoint.clone(),
            config.enrichment.fetch_config(),
        )
        .context("Creating catalog client")?;

        info!(
            "Chat model {} at {}, catalog at {}",
            model.model(),
            model.url(),
            config.enrichment.catalog_endpoint
        );
        Ok(OrchestratorBuilder::new(Arc::new(model), fetcher)
            .policy(config.enrichment.unenriched_policy)
            .moderation(&config.moderation)
            .build())
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn policy(&self) -> UnenrichedPolicy {
        self.policy
    }

    /// Names of the installed gates, in the order they run.
    pub fn gate_names(&self) -> Vec<&str> {
        self.gates.iter().map(|gate| gate.name()).collect()
    }

    /// Current history of a session.
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions.read(session_id).await
    }

    /// Main entry point: answer one search request.
    ///
    /// Never fails. Upstream problems are reported to the caller as a
    /// [`SearchResponse::Message`].
    #[instrument(skip(self, request), fields(session = %request.session_id))]
    pub async fn search(&self, request: QueryRequest) -> SearchResponse {
        let start_time = Instant::now();

        if let Some(rejection) = self.run_gates(&request) {
            info!("Request rejected with {}", rejection.kind());
            return rejection;
        }

        let exchange = self
            .sessions
            .begin_exchange(&request.session_id, request.query)
            .await;
        let outbound = exchange.outbound_turns();

        let reply = match self.model.complete(&outbound).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Chat model {} failed: {}", self.model.name(), e);
                exchange.abort();
                return SearchResponse::message(UPSTREAM_FAILURE_MESSAGE);
            }
        };
        debug!("Model replied in {:.2?}", start_time.elapsed());

        let shape = ReplyShape::from_classified(&classify(reply.as_str()));
        exchange.commit(&reply);
        info!("Reply recognized as {}", shape.name());

        let response = match shape {
            ReplyShape::Books {
                books,
                further_chat,
            } => self.enrich(books, further_chat).await,
            ReplyShape::NoMatches(reason) => SearchResponse::no_matches(reason),
            ReplyShape::Unrecognized => SearchResponse::message(FALLBACK_MESSAGE),
        };

        info!(
            "Answered with {} in {:.2?}",
            response.kind(),
            start_time.elapsed()
        );
        response
    }

    /// First rejection from the gates, if any.
    fn run_gates(&self, request: &QueryRequest) -> Option<SearchResponse> {
        self.gates.iter().find_map(|gate| {
            let rejection = gate.check(request);
            if rejection.is_some() {
                debug!("Gate {} rejected the request", gate.name());
            }
            rejection
        })
    }

    /// Fetch catalog metadata for `books` and merge it back in.
    async fn enrich(&self, books: Vec<Book>, further_chat: Option<String>) -> SearchResponse {
        let recommended = books.len();
        let keys = lookup_keys(&books);
        let outcomes = self.fetcher.fetch(&keys).await;
        let books = merge(books, &outcomes, self.policy);

        info!(
            "Enriched {} recommendations ({} lookup keys, {} returned, policy: {})",
            recommended,
            keys.len(),
            books.len(),
            self.policy
        );
        SearchResponse::Books(ResponseWithBooks {
            books,
            further_chat,
        })
    }
}

/// Builder for [`BookSearchOrchestrator`].
///
/// Gates run in the order they are added.
pub struct OrchestratorBuilder {
    sessions: SessionStore,
    model: Arc<dyn ChatModel>,
    fetcher: EnrichmentFetcher,
    policy: UnenrichedPolicy,
    gates: Vec<Box<dyn RequestGate>>,
}

impl OrchestratorBuilder {
    pub fn new(model: Arc<dyn ChatModel>, fetcher: EnrichmentFetcher) -> Self {
        Self {
            sessions: SessionStore::new(),
            model,
            fetcher,
            policy: UnenrichedPolicy::default(),
            gates: Vec::new(),
        }
    }

    /// Use an existing session store instead of a fresh one.
    pub fn sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn policy(mut self, policy: UnenrichedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a gate to the end of the gate list.
    pub fn add_gate(mut self, gate: impl RequestGate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    /// Install the profanity gate, then the rate limit gate.
    ///
    /// Either is skipped when its setting disables it.
    pub fn moderation(self, moderation: &ModerationConfig) -> Self {
        let profanity = ProfanityGate::new(moderation.effective_blocked_words());
        let min_interval = moderation.min_request_interval();
        let builder = if profanity.is_empty() {
            self
        } else {
            self.add_gate(profanity)
        };
        if min_interval.is_zero() {
            builder
        } else {
            builder.add_gate(RateLimitGate::new(min_interval))
        }
    }

    pub fn build(self) -> BookSearchOrchestrator {
        BookSearchOrchestrator {
            sessions: self.sessions,
            model: self.model,
            fetcher: self.fetcher,
            policy: self.policy,
            gates: Arc::new(self.gates),
        }
    }
}
