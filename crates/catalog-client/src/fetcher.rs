//! Concurrent enrichment fetching.
//!
//! ## Algorithm
//! 1. Trim and deduplicate the keys, keeping first-seen order
//! 2. Run one lookup per unique key, at most `concurrency_limit` at once
//! 3. Give each key up to `retries_per_key` attempts, each bounded by
//!    `per_attempt_timeout`
//! 4. Resolve each key to `Success`, `Empty` or `Failed` and collect the
//!    `(key, outcome)` pairs
//!
//! A failing or slow key never cancels or delays its siblings beyond the
//! concurrency bound; the call returns once every key has resolved.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::{Isbn, Outcome};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::error::CatalogError;
use crate::normalize::{first_record, normalize_record};
use crate::transport::{CatalogTransport, OpenLibraryTransport};

/// Default number of lookups in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 20;

/// Default number of attempts per key.
pub const DEFAULT_RETRIES_PER_KEY: u32 = 2;

/// Default timeout for one attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning knobs for [`EnrichmentFetcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Maximum lookups in flight; values below 1 act as 1
    pub concurrency_limit: usize,
    /// Attempts per key; values below 1 act as 1
    pub retries_per_key: u32,
    /// Upper bound on a single attempt
    pub per_attempt_timeout: Duration,
}

impl FetchConfig {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_retries_per_key(mut self, retries: u32) -> Self {
        self.retries_per_key = retries;
        self
    }

    pub fn with_per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            retries_per_key: DEFAULT_RETRIES_PER_KEY,
            per_attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// Fans out catalog lookups for a batch of keys.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct EnrichmentFetcher {
    transport: Arc<dyn CatalogTransport>,
    config: FetchConfig,
}

impl EnrichmentFetcher {
    pub fn new(transport: Arc<dyn CatalogTransport>, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    /// Fetcher backed by [`OpenLibraryTransport`] at `endpoint`.
    pub fn open_library(
        endpoint: impl Into<String>,
        config: FetchConfig,
    ) -> Result<Self, CatalogError> {
        let transport = OpenLibraryTransport::new(endpoint, config.per_attempt_timeout)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Look up every unique key and return its outcome.
    ///
    /// Blank keys are ignored. The result holds exactly one entry per
    /// unique trimmed key.
    #[instrument(skip_all, fields(transport = self.transport.name()))]
    pub async fn fetch<I, S>(&self, keys: I) -> HashMap<Isbn, Outcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let start_time = Instant::now();
        let unique_keys = dedup_keys(keys);
        if unique_keys.is_empty() {
            return HashMap::new();
        }
        let key_count = unique_keys.len();
        let limit = self.config.concurrency_limit.max(1);
        debug!(
            "Fetching {} keys (concurrency: {}, attempts: {})",
            key_count,
            limit,
            self.config.retries_per_key.max(1)
        );

        let outcomes: HashMap<Isbn, Outcome> = stream::iter(unique_keys)
            .map(|key| async move {
                let outcome = self.fetch_one(&key).await;
                (key, outcome)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let succeeded = outcomes
            .values()
            .filter(|o| matches!(o, Outcome::Success(_)))
            .count();
        let empty = outcomes.values().filter(|o| **o == Outcome::Empty).count();
        info!(
            "Fetched {} keys in {:.2?} (success: {}, empty: {}, failed: {})",
            key_count,
            start_time.elapsed(),
            succeeded,
            empty,
            key_count - succeeded - empty
        );
        outcomes
    }

    /// Resolve one key, retrying failed attempts.
    async fn fetch_one(&self, key: &str) -> Outcome {
        let attempts = self.config.retries_per_key.max(1);
        for attempt in 1..=attempts {
            match self.attempt(key).await {
                Ok(body) => {
                    return match first_record(&body) {
                        Some(record) => Outcome::Success(normalize_record(record)),
                        None => {
                            debug!("No catalog record for {}", key);
                            Outcome::Empty
                        }
                    };
                }
                Err(e) => warn!(
                    "Lookup for {} failed (attempt {}/{}): {}",
                    key, attempt, attempts, e
                ),
            }
        }
        Outcome::Failed
    }

    async fn attempt(&self, key: &str) -> Result<serde_json::Value, CatalogError> {
        let timeout = self.config.per_attempt_timeout;
        tokio::time::timeout(timeout, self.transport.lookup(key))
            .await
            .map_err(|_| CatalogError::Timeout(timeout))?
    }
}

/// Trim keys, drop blanks and duplicates, keep first-seen order.
pub fn dedup_keys<I, S>(keys: I) -> Vec<Isbn>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(|key| key.as_ref().trim().to_string())
        .filter(|key| !key.is_empty() && seen.insert(key.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ============================================================================
    // Fake Transport
    // ============================================================================

    #[derive(Clone)]
    enum Behavior {
        Record(Value),
        NoDocs,
        AlwaysFail,
        /// Fail this many attempts, then return the record
        FailThen(usize, Value),
        Hang,
    }

    struct FakeTransport {
        behaviors: HashMap<String, Behavior>,
        delay: Duration,
        calls: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeTransport {
        fn new(behaviors: Vec<(&str, Behavior)>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                behaviors: behaviors
                    .into_iter()
                    .map(|(key, behavior)| (key.to_string(), behavior))
                    .collect(),
                delay,
                calls: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn calls(&self, key: &str) -> usize {
            self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl CatalogTransport for FakeTransport {
        fn name(&self) -> &str {
            "FakeTransport"
        }

        async fn lookup(&self, key: &str) -> Result<Value, CatalogError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(key.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let behavior = self.behaviors.get(key).cloned().unwrap_or(Behavior::NoDocs);
            if let Behavior::Hang = behavior {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match behavior {
                Behavior::Record(record) => Ok(json!({"numFound": 1, "docs": [record]})),
                Behavior::NoDocs => Ok(json!({"numFound": 0, "docs": []})),
                Behavior::AlwaysFail => Err(CatalogError::Status { status: 503 }),
                Behavior::FailThen(failures, record) => {
                    if call <= failures {
                        Err(CatalogError::Decode("truncated body".to_string()))
                    } else {
                        Ok(json!({"docs": [record]}))
                    }
                }
                Behavior::Hang => unreachable!(),
            }
        }
    }

    fn record(rating: f64) -> Value {
        json!({"ratings_average": rating, "ratings_count": 10})
    }

    fn fetcher(transport: Arc<FakeTransport>, config: FetchConfig) -> EnrichmentFetcher {
        EnrichmentFetcher::new(transport, config)
    }

    // ============================================================================
    // Unit Tests
    // ============================================================================

    #[test]
    fn test_dedup_keys_keeps_first_seen_order() {
        let keys = dedup_keys(["k2", " k1", "k2", "", "  ", "k1 ", "k3"]);
        assert_eq!(keys, vec!["k2", "k1", "k3"]);
    }

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.concurrency_limit, 20);
        assert_eq!(config.retries_per_key, 2);
        assert_eq!(config.per_attempt_timeout, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_and_normalization() {
        let transport = FakeTransport::new(
            vec![("k1", Behavior::Record(record(4.567)))],
            Duration::from_millis(10),
        );
        let outcomes = fetcher(transport, FetchConfig::default()).fetch(["k1"]).await;

        match &outcomes["k1"] {
            Outcome::Success(details) => {
                assert_eq!(details.ratings_average, "4.57");
                assert_eq!(details.ratings_count, "10");
                assert_eq!(details.first_publish_year, "");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_docs_is_empty_outcome() {
        let transport = FakeTransport::new(vec![("k1", Behavior::NoDocs)], Duration::ZERO);
        let outcomes = fetcher(transport.clone(), FetchConfig::default())
            .fetch(["k1"])
            .await;

        assert_eq!(outcomes["k1"], Outcome::Empty);
        assert_eq!(transport.calls("k1"), 1, "empty is not retried");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_keys_issue_one_lookup() {
        let transport = FakeTransport::new(
            vec![
                ("k1", Behavior::Record(record(4.0))),
                ("k2", Behavior::Record(record(3.0))),
            ],
            Duration::from_millis(10),
        );
        let outcomes = fetcher(transport.clone(), FetchConfig::default())
            .fetch(["k1", "k2", "k1", " k1 "])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(transport.calls("k1"), 1);
        assert_eq!(transport.calls("k2"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_key_is_isolated_and_runs_concurrently() {
        let transport = FakeTransport::new(
            vec![
                ("k1", Behavior::Record(record(4.1))),
                ("k2", Behavior::AlwaysFail),
                ("k3", Behavior::Record(record(3.9))),
            ],
            Duration::from_millis(100),
        );
        let fetcher = fetcher(transport.clone(), FetchConfig::default());

        let start = tokio::time::Instant::now();
        let outcomes = fetcher.fetch(["k1", "k2", "k3"]).await;
        let elapsed = start.elapsed();

        assert!(matches!(outcomes["k1"], Outcome::Success(_)));
        assert!(matches!(outcomes["k3"], Outcome::Success(_)));
        assert_eq!(outcomes["k2"], Outcome::Failed);
        assert_eq!(transport.calls("k2"), 2);

        // Serial execution would need 400ms (k1 + two k2 attempts + k3)
        assert!(
            elapsed < Duration::from_millis(250),
            "lookups should overlap, took {:?}",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let transport = FakeTransport::new(
            vec![("k1", Behavior::FailThen(1, record(4.25)))],
            Duration::ZERO,
        );
        let outcomes = fetcher(transport.clone(), FetchConfig::default())
            .fetch(["k1"])
            .await;

        assert!(matches!(outcomes["k1"], Outcome::Success(_)));
        assert_eq!(transport.calls("k1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_respected() {
        let transport = FakeTransport::new(vec![("k1", Behavior::AlwaysFail)], Duration::ZERO);
        let config = FetchConfig::default().with_retries_per_key(4);
        let outcomes = fetcher(transport.clone(), config).fetch(["k1"]).await;

        assert_eq!(outcomes["k1"], Outcome::Failed);
        assert_eq!(transport.calls("k1"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_still_attempts_once() {
        let transport = FakeTransport::new(vec![("k1", Behavior::AlwaysFail)], Duration::ZERO);
        let config = FetchConfig::default().with_retries_per_key(0);
        fetcher(transport.clone(), config).fetch(["k1"]).await;

        assert_eq!(transport.calls("k1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_count_as_failed_attempts() {
        let transport = FakeTransport::new(
            vec![
                ("slow", Behavior::Hang),
                ("fast", Behavior::Record(record(4.0))),
            ],
            Duration::from_millis(10),
        );
        let config = FetchConfig::default().with_per_attempt_timeout(Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        let outcomes = fetcher(transport.clone(), config)
            .fetch(["slow", "fast"])
            .await;
        let elapsed = start.elapsed();

        assert_eq!(outcomes["slow"], Outcome::Failed);
        assert!(matches!(outcomes["fast"], Outcome::Success(_)));
        assert_eq!(transport.calls("slow"), 2);
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_bounds_in_flight_lookups() {
        let keys: Vec<String> = (0..10).map(|i| format!("k{}", i)).collect();
        let transport = FakeTransport::new(
            keys.iter()
                .map(|k| (k.as_str(), Behavior::Record(record(4.0))))
                .collect(),
            Duration::from_millis(50),
        );
        let config = FetchConfig::default().with_concurrency_limit(3);

        let start = tokio::time::Instant::now();
        let outcomes = fetcher(transport.clone(), config).fetch(&keys).await;
        let elapsed = start.elapsed();

        assert_eq!(outcomes.len(), 10);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 3);
        // Ten lookups, three at a time: four waves of 50ms
        assert!(elapsed >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_no_keys_means_no_lookups() {
        let transport = FakeTransport::new(vec![], Duration::ZERO);
        let outcomes = fetcher(transport.clone(), FetchConfig::default())
            .fetch(Vec::<String>::new())
            .await;

        assert!(outcomes.is_empty());
        assert_eq!(transport.total_calls(), 0);
    }
}
