//! Catalog transports.
//!
//! A transport performs one lookup attempt and hands back the parsed body
//! of a successful response. Retries and timeouts belong to the fetcher,
//! so transports stay trivial to fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::CatalogError;

/// Open Library search endpoint.
pub const OPEN_LIBRARY_SEARCH_URL: &str = "https://openlibrary.org/search.json";

const USER_AGENT: &str = concat!("ShelfRecs/", env!("CARGO_PKG_VERSION"));

/// One catalog lookup attempt, parameterized solely by the key.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// Returns the name of this transport (for logging/debugging)
    fn name(&self) -> &str;

    /// Look up `key`, returning the parsed body of a 2xx response.
    ///
    /// Non-2xx statuses, transport errors and unparseable bodies are
    /// errors.
    async fn lookup(&self, key: &str) -> Result<Value, CatalogError>;
}

/// HTTP transport for the Open Library search API.
///
/// Issues `GET <endpoint>?isbn=<key>`.
#[derive(Debug, Clone)]
pub struct OpenLibraryTransport {
    http_client: reqwest::Client,
    endpoint: String,
}

impl OpenLibraryTransport {
    /// Create a transport for `endpoint`.
    ///
    /// # Arguments
    /// * `endpoint` - Search URL (e.g., [`OPEN_LIBRARY_SEARCH_URL`])
    /// * `timeout` - Client-side timeout for a single request
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CatalogTransport for OpenLibraryTransport {
    fn name(&self) -> &str {
        "OpenLibraryTransport"
    }

    async fn lookup(&self, key: &str) -> Result<Value, CatalogError> {
        debug!(isbn = %key, endpoint = %self.endpoint, "Querying catalog");

        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("isbn", key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }
}
