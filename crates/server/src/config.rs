//! Service configuration.
//!
//! Loaded from a TOML file where every section and field is optional,
//! then validated as a whole before anything is built from it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use catalog_client::{FetchConfig, OPEN_LIBRARY_SEARCH_URL};
use conversation::HISTORY_WINDOW;
use llm_client::{
    ChatClientConfig, LlmClientError, DEFAULT_API_BASE, DEFAULT_API_KEY_ENV, DEFAULT_CHAT_PATH,
    DEFAULT_MODEL,
};
use pipeline::UnenrichedPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gates::DEFAULT_BLOCKED_WORDS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub enrichment: EnrichmentConfig,
    pub conversation: ConversationConfig,
    pub model: ModelConfig,
    pub moderation: ModerationConfig,
}

/// `[enrichment]`: catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnrichmentConfig {
    pub catalog_endpoint: String,
    pub concurrency_limit: usize,
    pub retries_per_key: u32,
    pub per_attempt_timeout_ms: u64,
    pub unenriched_policy: UnenrichedPolicy,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        let fetch = FetchConfig::default();
        Self {
            catalog_endpoint: OPEN_LIBRARY_SEARCH_URL.to_string(),
            concurrency_limit: fetch.concurrency_limit,
            retries_per_key: fetch.retries_per_key,
            per_attempt_timeout_ms: fetch.per_attempt_timeout.as_millis() as u64,
            unenriched_policy: UnenrichedPolicy::default(),
        }
    }
}

impl EnrichmentConfig {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::default()
            .with_concurrency_limit(self.concurrency_limit)
            .with_retries_per_key(self.retries_per_key)
            .with_per_attempt_timeout(Duration::from_millis(self.per_attempt_timeout_ms))
    }
}

/// `[conversation]`: session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversationConfig {
    /// Only [`HISTORY_WINDOW`] is accepted.
    pub history_window: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: HISTORY_WINDOW,
        }
    }
}

/// `[model]`: the chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub api_base: String,
    pub path: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_ms: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            path: DEFAULT_CHAT_PATH.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            timeout_ms: 30_000,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl ModelConfig {
    /// Client settings, reading the key from `api_key_env`.
    pub fn client_config(&self) -> Result<ChatClientConfig, LlmClientError> {
        let api_key = llm_client::read_api_key(&self.api_key_env)?;
        Ok(ChatClientConfig {
            api_base: self.api_base.clone(),
            path: self.path.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_millis(self.timeout_ms),
            api_key,
        })
    }
}

/// `[moderation]`: request gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModerationConfig {
    /// Start from the built-in word list
    pub use_default_words: bool,
    /// Extra case-insensitive whole words that reject a query
    pub blocked_words: Vec<String>,
    /// Minimum time between two queries of one session; 0 disables
    pub min_request_interval_ms: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            use_default_words: true,
            blocked_words: Vec::new(),
            min_request_interval_ms: 0,
        }
    }
}

impl ModerationConfig {
    /// The built-in list (when enabled) followed by `blocked_words`.
    pub fn effective_blocked_words(&self) -> Vec<String> {
        let builtin: &[&str] = if self.use_default_words {
            DEFAULT_BLOCKED_WORDS
        } else {
            &[]
        };
        builtin
            .iter()
            .map(|word| word.to_string())
            .chain(self.blocked_words.iter().cloned())
            .collect()
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let enrichment = &self.enrichment;
        if enrichment.catalog_endpoint.trim().is_empty() {
            return Err(ConfigError::invalid(
                "enrichment.catalog_endpoint must be non-empty.",
            ));
        }
        for (label, value) in [
            ("enrichment.concurrency_limit", enrichment.concurrency_limit as u64),
            ("enrichment.retries_per_key", u64::from(enrichment.retries_per_key)),
            ("enrichment.per_attempt_timeout_ms", enrichment.per_attempt_timeout_ms),
            ("model.timeout_ms", self.model.timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(format!("{label} must be greater than 0.")));
            }
        }

        if self.conversation.history_window != HISTORY_WINDOW {
            return Err(ConfigError::invalid(format!(
                "conversation.history_window must be {HISTORY_WINDOW}, got {}.",
                self.conversation.history_window
            )));
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::invalid(
                "model.temperature must be between 0.0 and 2.0.",
            ));
        }
        for (label, value) in [
            ("model.api_base", &self.model.api_base),
            ("model.model", &self.model.model),
            ("model.api_key_env", &self.model.api_key_env),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(format!("{label} must be non-empty.")));
            }
        }

        if self
            .moderation
            .blocked_words
            .iter()
            .any(|word| word.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "moderation.blocked_words must not contain blank entries.",
            ));
        }
        Ok(())
    }
}
